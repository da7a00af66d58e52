//! Event frames and batches
//!
//! An [`EventFrame`] is one `input_event` record. A [`FrameBatch`] is the
//! set of frames describing one instant, always closed by exactly one
//! `SYN_REPORT`; batches are the unit the transport flushes.

use crate::device::codes::{EventCode, EV_SYN, SYN_REPORT, TRACKING_ID_RELEASE};
use crate::time::timebase::Timestamp;
use serde::{Deserialize, Serialize};

/// Binary layout of `struct input_event` on the target.
///
/// `struct timeval` is two `long`s, so the record is 24 bytes on 64-bit
/// kernels and 16 bytes on 32-bit ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordLayout {
    #[default]
    Bits64,
    Bits32,
}

impl RecordLayout {
    /// Layout matching the running process.
    pub fn native() -> Self {
        if cfg!(target_pointer_width = "32") {
            RecordLayout::Bits32
        } else {
            RecordLayout::Bits64
        }
    }

    /// Size of one record in bytes.
    pub const fn record_size(&self) -> usize {
        match self {
            RecordLayout::Bits64 => 24,
            RecordLayout::Bits32 => 16,
        }
    }
}

/// One `(type, code, value)` input event with its gesture-relative time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventFrame {
    #[serde(rename = "type")]
    pub kind: u16,
    pub code: u16,
    pub value: i32,
    pub at: Timestamp,
}

impl EventFrame {
    pub fn new(code: EventCode, value: i32, at: Timestamp) -> Self {
        Self {
            kind: code.kind,
            code: code.code,
            value,
            at,
        }
    }

    pub fn sync(at: Timestamp) -> Self {
        Self::new(EventCode::SYN_REPORT, 0, at)
    }

    pub fn event_code(&self) -> EventCode {
        EventCode::new(self.kind, self.code)
    }

    /// `SYN_REPORT`
    pub fn is_sync(&self) -> bool {
        self.kind == EV_SYN && self.code == SYN_REPORT
    }

    /// Tracking-id assignment (contact starts).
    pub fn is_activation(&self) -> bool {
        self.event_code() == EventCode::MT_TRACKING_ID && self.value >= 0
    }

    /// Tracking-id release (contact ends).
    pub fn is_release(&self) -> bool {
        self.event_code() == EventCode::MT_TRACKING_ID && self.value == TRACKING_ID_RELEASE
    }

    /// Append the binary record in native byte order.
    pub fn write_record(&self, layout: RecordLayout, buf: &mut Vec<u8>) {
        let (secs, micros) = self.at.as_timeval();
        match layout {
            RecordLayout::Bits64 => {
                buf.extend_from_slice(&(secs as i64).to_ne_bytes());
                buf.extend_from_slice(&(micros as i64).to_ne_bytes());
            }
            RecordLayout::Bits32 => {
                buf.extend_from_slice(&(secs as i32).to_ne_bytes());
                buf.extend_from_slice(&(micros as i32).to_ne_bytes());
            }
        }
        buf.extend_from_slice(&self.kind.to_ne_bytes());
        buf.extend_from_slice(&self.code.to_ne_bytes());
        buf.extend_from_slice(&self.value.to_ne_bytes());
    }

    /// Decode one record written by [`EventFrame::write_record`].
    pub fn read_record(layout: RecordLayout, bytes: &[u8]) -> Option<Self> {
        if bytes.len() < layout.record_size() {
            return None;
        }
        let (secs, micros, rest) = match layout {
            RecordLayout::Bits64 => (
                i64::from_ne_bytes(bytes[0..8].try_into().ok()?) as u64,
                i64::from_ne_bytes(bytes[8..16].try_into().ok()?) as u64,
                &bytes[16..24],
            ),
            RecordLayout::Bits32 => (
                i32::from_ne_bytes(bytes[0..4].try_into().ok()?) as u64,
                i32::from_ne_bytes(bytes[4..8].try_into().ok()?) as u64,
                &bytes[8..16],
            ),
        };
        Some(Self {
            kind: u16::from_ne_bytes(rest[0..2].try_into().ok()?),
            code: u16::from_ne_bytes(rest[2..4].try_into().ok()?),
            value: i32::from_ne_bytes(rest[4..8].try_into().ok()?),
            at: Timestamp::from_micros(secs * 1_000_000 + micros),
        })
    }

    /// Render as an Android `sendevent` command line.
    pub fn to_sendevent(&self, device: &str) -> String {
        format!("sendevent {} {} {} {}", device, self.kind, self.code, self.value)
    }
}

impl std::fmt::Display for EventFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} {}", self.at, self.event_code(), self.value)
    }
}

/// Frames for one instant, closed by a single `SYN_REPORT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameBatch {
    frames: Vec<EventFrame>,
}

impl FrameBatch {
    /// Start a batch at `at`.
    pub fn builder(at: Timestamp) -> BatchBuilder {
        BatchBuilder {
            at,
            frames: Vec::with_capacity(8),
        }
    }

    /// Instant the batch describes.
    pub fn at(&self) -> Timestamp {
        self.frames.last().map(|f| f.at).unwrap_or_default()
    }

    pub fn frames(&self) -> &[EventFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<EventFrame> {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventFrame> {
        self.frames.iter()
    }

    /// Value written for `code` in this batch, if any.
    pub fn value_of(&self, code: EventCode) -> Option<i32> {
        self.frames
            .iter()
            .find(|f| f.event_code() == code)
            .map(|f| f.value)
    }

    /// Encode every record of the batch.
    pub fn to_bytes(&self, layout: RecordLayout) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.frames.len() * layout.record_size());
        for frame in &self.frames {
            frame.write_record(layout, &mut buf);
        }
        buf
    }
}

/// Collects the frames of one instant; [`BatchBuilder::finish`] appends the sync.
#[derive(Debug)]
pub struct BatchBuilder {
    at: Timestamp,
    frames: Vec<EventFrame>,
}

impl BatchBuilder {
    pub fn push(&mut self, code: EventCode, value: i32) -> &mut Self {
        self.frames.push(EventFrame::new(code, value, self.at));
        self
    }

    /// True if nothing but the closing sync would be written.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn finish(mut self) -> FrameBatch {
        self.frames.push(EventFrame::sync(self.at));
        FrameBatch {
            frames: self.frames,
        }
    }
}
