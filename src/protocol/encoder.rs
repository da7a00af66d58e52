//! Type-B multitouch encoder
//!
//! Converts timed points into [`FrameBatch`]es following the kernel's
//! slot protocol:
//!
//! ```text
//! touch-down   ABS_MT_SLOT s, ABS_MT_TRACKING_ID id, X, Y, MAJOR, PRESSURE, BTN_TOUCH 1, SYN
//! motion       <changed axes only>, SYN
//! lift         BTN_TOUCH 0, ABS_MT_TRACKING_ID -1, SYN
//! force        ABS_MT_SLOT s, BTN_TOUCH 0, ABS_MT_TRACKING_ID -1, SYN
//! ```
//!
//! Codes the device does not report are left out. Tracking ids come from
//! the [`SlotTable`], which also guarantees a slot is never handed out twice
//! while active.

use super::frame::FrameBatch;
use crate::device::capabilities::{DeviceCapabilities, MAX_SLOTS};
use crate::device::codes::{EventCode, TRACKING_ID_RELEASE};
use crate::gesture::types::{Timeline, TimedPoint};
use crate::time::timebase::Timestamp;
use crate::{Error, Result};
use std::time::Duration;
use tracing::{debug, trace};

/// A multitouch slot held for one contact.
///
/// Not `Clone`: a slot is freed only by handing it back
/// to [`SlotTable::release`].
#[derive(Debug, PartialEq, Eq)]
pub struct TouchSlot {
    id: u32,
    tracking_id: i32,
    active: bool,
}

impl TouchSlot {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn tracking_id(&self) -> i32 {
        self.tracking_id
    }

    /// True between touch-down and release.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Slot allocator and tracking-id counter for one device.
#[derive(Debug, Clone)]
pub struct SlotTable {
    in_use: Vec<bool>,
    next_tracking_id: i32,
    tracking_id_max: i32,
}

impl SlotTable {
    pub fn new(caps: &DeviceCapabilities) -> Self {
        Self {
            in_use: vec![false; caps.max_slots.clamp(1, MAX_SLOTS) as usize],
            next_tracking_id: 0,
            tracking_id_max: caps.tracking_id_max.max(1),
        }
    }

    /// Take the lowest free slot with a fresh tracking id.
    pub fn acquire(&mut self) -> Result<TouchSlot> {
        let id = self
            .in_use
            .iter()
            .position(|used| !used)
            .ok_or(Error::SlotExhausted {
                max_slots: self.in_use.len() as u32,
            })?;
        self.in_use[id] = true;

        let tracking_id = self.next_tracking_id;
        self.next_tracking_id = if tracking_id >= self.tracking_id_max {
            0
        } else {
            tracking_id + 1
        };

        trace!("acquired slot {} (tracking id {})", id, tracking_id);
        Ok(TouchSlot {
            id: id as u32,
            tracking_id,
            active: false,
        })
    }

    /// Return a slot to the table.
    pub fn release(&mut self, slot: TouchSlot) {
        if let Some(used) = self.in_use.get_mut(slot.id as usize) {
            *used = false;
        }
        trace!("released slot {}", slot.id);
    }

    pub fn is_in_use(&self, id: u32) -> bool {
        self.in_use.get(id as usize).copied().unwrap_or(false)
    }

    pub fn in_use_count(&self) -> usize {
        self.in_use.iter().filter(|used| **used).count()
    }

    pub fn capacity(&self) -> usize {
        self.in_use.len()
    }
}

/// Which optional codes the device reports.
#[derive(Debug, Clone, Copy)]
struct Profile {
    slots: bool,
    btn_touch: bool,
    pressure: bool,
    touch_major: bool,
}

impl Profile {
    fn from_caps(caps: &DeviceCapabilities) -> Self {
        Self {
            slots: caps.has_slots(),
            btn_touch: caps.supports(EventCode::BTN_TOUCH),
            pressure: caps.supports(EventCode::MT_PRESSURE),
            touch_major: caps.supports(EventCode::MT_TOUCH_MAJOR),
        }
    }
}

/// Last axis values written for the active contact.
#[derive(Debug, Clone, Copy)]
struct Contact {
    x: i32,
    y: i32,
    pressure: i32,
    touch_major: i32,
}

/// Stateful encoder for a single contact.
#[derive(Debug)]
pub struct ProtocolEncoder {
    profile: Profile,
    max_slots: u32,
    contact: Option<Contact>,
    last_at: Option<Timestamp>,
}

impl ProtocolEncoder {
    pub fn new(caps: &DeviceCapabilities) -> Self {
        Self {
            profile: Profile::from_caps(caps),
            max_slots: caps.max_slots,
            contact: None,
            last_at: None,
        }
    }

    /// True while a contact is down.
    pub fn is_active(&self) -> bool {
        self.contact.is_some()
    }

    /// Timestamp of the last batch produced.
    pub fn last_at(&self) -> Option<Timestamp> {
        self.last_at
    }

    /// Encode a whole timeline: touch-down, motion, lift.
    pub fn encode(&mut self, timeline: &Timeline, slot: &mut TouchSlot) -> Result<Vec<FrameBatch>> {
        let Some((first, rest)) = timeline.points.split_first() else {
            return Ok(Vec::new());
        };

        let mut batches = Vec::with_capacity(timeline.points.len() + 1);
        batches.push(self.touch_down(slot, first)?);
        batches.extend(rest.iter().filter_map(|p| self.motion(p)));
        batches.extend(self.lift(slot, timeline.lift_at));

        debug!(
            "encoded {} points into {} batches",
            timeline.points.len(),
            batches.len()
        );
        Ok(batches)
    }

    /// First contact of a gesture.
    pub fn touch_down(&mut self, slot: &mut TouchSlot, point: &TimedPoint) -> Result<FrameBatch> {
        if slot.active || self.contact.is_some() {
            return Err(Error::SlotExhausted {
                max_slots: self.max_slots,
            });
        }

        let at = self.next_at(point.at);
        let mut batch = FrameBatch::builder(at);
        if self.profile.slots {
            batch.push(EventCode::MT_SLOT, slot.id as i32);
        }
        batch
            .push(EventCode::MT_TRACKING_ID, slot.tracking_id)
            .push(EventCode::MT_POSITION_X, point.x)
            .push(EventCode::MT_POSITION_Y, point.y);
        if self.profile.touch_major {
            batch.push(EventCode::MT_TOUCH_MAJOR, point.touch_major);
        }
        if self.profile.pressure {
            batch.push(EventCode::MT_PRESSURE, point.pressure);
        }
        if self.profile.btn_touch {
            batch.push(EventCode::BTN_TOUCH, 1);
        }

        slot.active = true;
        self.contact = Some(Contact {
            x: point.x,
            y: point.y,
            pressure: point.pressure,
            touch_major: point.touch_major,
        });
        Ok(batch.finish())
    }

    /// Move the active contact. Returns `None` when nothing changed or no
    /// contact is down.
    pub fn motion(&mut self, point: &TimedPoint) -> Option<FrameBatch> {
        let contact = self.contact?;

        let mut changed = Vec::with_capacity(4);
        if point.x != contact.x {
            changed.push((EventCode::MT_POSITION_X, point.x));
        }
        if point.y != contact.y {
            changed.push((EventCode::MT_POSITION_Y, point.y));
        }
        if self.profile.touch_major && point.touch_major != contact.touch_major {
            changed.push((EventCode::MT_TOUCH_MAJOR, point.touch_major));
        }
        if self.profile.pressure && point.pressure != contact.pressure {
            changed.push((EventCode::MT_PRESSURE, point.pressure));
        }
        if changed.is_empty() {
            return None;
        }

        let mut batch = FrameBatch::builder(self.next_at(point.at));
        for (code, value) in changed {
            batch.push(code, value);
        }
        self.contact = Some(Contact {
            x: point.x,
            y: point.y,
            pressure: point.pressure,
            touch_major: point.touch_major,
        });
        Some(batch.finish())
    }

    /// Normal end of the contact. Returns `None` if the slot is not active.
    pub fn lift(&mut self, slot: &mut TouchSlot, at: Timestamp) -> Option<FrameBatch> {
        if !slot.active {
            return None;
        }
        Some(self.release(slot, at, false))
    }

    /// Release on an abnormal path. Always emitted, and re-selects the slot
    /// first since the device may have seen another slot in the meantime.
    pub fn force_release(&mut self, slot: &mut TouchSlot, at: Timestamp) -> FrameBatch {
        self.release(slot, at, true)
    }

    fn release(&mut self, slot: &mut TouchSlot, at: Timestamp, reselect: bool) -> FrameBatch {
        let at = self.next_at(at);
        let mut batch = FrameBatch::builder(at);
        if reselect && self.profile.slots {
            batch.push(EventCode::MT_SLOT, slot.id as i32);
        }
        if self.profile.btn_touch {
            batch.push(EventCode::BTN_TOUCH, 0);
        }
        batch.push(EventCode::MT_TRACKING_ID, TRACKING_ID_RELEASE);

        slot.active = false;
        self.contact = None;
        batch.finish()
    }

    /// Keep batch timestamps strictly increasing.
    fn next_at(&mut self, at: Timestamp) -> Timestamp {
        let at = match self.last_at {
            Some(last) if !at.is_after(last) => last.advanced_by(Duration::from_micros(1)),
            _ => at,
        };
        self.last_at = Some(at);
        at
    }
}
