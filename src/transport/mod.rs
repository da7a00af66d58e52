//! Device transport
//!
//! A [`DeviceTransport`] owns one write handle for the duration of a
//! gesture. Frames are buffered until their `SYN_REPORT` arrives and then
//! handed to the [`FrameSink`] as a single submission, so a reader never
//! observes half of an update. Transient sink errors are retried with
//! backoff (see [`retry`]).

pub mod evdev;
pub mod memory;
pub mod retry;
pub mod sendevent;

pub use evdev::EvdevSink;
pub use memory::MemorySink;
pub use retry::RetryPolicy;
pub use sendevent::ScriptSink;

use crate::protocol::frame::{EventFrame, FrameBatch, RecordLayout};
use crate::time::timebase::{Clock, MonotonicClock};
use crate::Result;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Destination for complete, sync-terminated batches.
pub trait FrameSink: Send {
    /// Write one batch. Must be all-or-nothing from the reader's view.
    fn submit(&mut self, frames: &[EventFrame]) -> io::Result<()>;

    /// The device is left idle for `d` between gestures.
    fn idle(&mut self, _d: Duration) -> io::Result<()> {
        Ok(())
    }

    /// Flush and finalize; called once on close.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Short label for logs.
    fn describe(&self) -> String;
}

impl FrameSink for Box<dyn FrameSink> {
    fn submit(&mut self, frames: &[EventFrame]) -> io::Result<()> {
        (**self).submit(frames)
    }

    fn idle(&mut self, d: Duration) -> io::Result<()> {
        (**self).idle(d)
    }

    fn finish(&mut self) -> io::Result<()> {
        (**self).finish()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Scoped, exclusive write access to one device.
pub struct DeviceTransport<S: FrameSink = Box<dyn FrameSink>> {
    sink: S,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    pending: Vec<EventFrame>,
    frames_written: usize,
    batches_written: usize,
}

impl DeviceTransport<EvdevSink> {
    /// Open an evdev node for writing with the native record layout.
    ///
    /// Fails with [`Error::DeviceUnavailable`](crate::Error::DeviceUnavailable)
    /// if the node is missing, a directory or not writable.
    pub fn open_evdev(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_evdev_with(path, RecordLayout::native(), RetryPolicy::default())
    }

    pub fn open_evdev_with(
        path: impl AsRef<Path>,
        layout: RecordLayout,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let sink = EvdevSink::open(path.as_ref(), layout)?;
        Ok(Self::new(sink, policy))
    }
}

impl<S: FrameSink> DeviceTransport<S> {
    pub fn new(sink: S, policy: RetryPolicy) -> Self {
        Self {
            sink,
            policy,
            clock: Arc::new(MonotonicClock::new()),
            pending: Vec::with_capacity(16),
            frames_written: 0,
            batches_written: 0,
        }
    }

    /// Use `clock` for retry backoff.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Queue one frame; a sync frame flushes the batch.
    pub fn write(&mut self, frame: EventFrame) -> Result<()> {
        let is_sync = frame.is_sync();
        self.pending.push(frame);
        if is_sync {
            self.flush()?;
        }
        Ok(())
    }

    /// Write every frame of a batch (ends in a flush).
    pub fn write_batch(&mut self, batch: &FrameBatch) -> Result<()> {
        for frame in batch.iter() {
            self.write(*frame)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let context = self.sink.describe();
        let sink = &mut self.sink;
        let pending = &self.pending;
        let result =
            retry::write_with_retry(&self.policy, self.clock.as_ref(), &context, || {
                sink.submit(pending)
            });

        // a failed batch is abandoned, never merged into the next one
        let count = self.pending.len();
        self.pending.clear();
        result?;

        self.frames_written += count;
        self.batches_written += 1;
        Ok(())
    }

    /// Tell the sink the device stays idle for `d` before the next gesture.
    pub fn pause(&mut self, d: Duration) -> Result<()> {
        self.sink.idle(d)?;
        Ok(())
    }

    /// Frames successfully submitted so far.
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn batches_written(&self) -> usize {
        self.batches_written
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn describe(&self) -> String {
        self.sink.describe()
    }

    /// Finalize the sink. Frames without a closing sync are discarded.
    pub fn close(mut self) -> Result<S> {
        if !self.pending.is_empty() {
            warn!(
                "{}: dropping {} unsynchronized frame(s) on close",
                self.sink.describe(),
                self.pending.len()
            );
            self.pending.clear();
        }
        self.sink.finish()?;
        debug!(
            "{}: closed after {} frames in {} batches",
            self.sink.describe(),
            self.frames_written,
            self.batches_written
        );
        Ok(self.sink)
    }
}
