//! Linux input event codes
//!
//! The subset of `linux/input-event-codes.h` used by the type-B multitouch
//! protocol, plus name lookup for parsing `getevent -pl` listings.

use serde::{Deserialize, Serialize};

// Event types
pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_ABS: u16 = 0x03;

// Synchronization codes
pub const SYN_REPORT: u16 = 0x00;

// Key codes
pub const BTN_TOUCH: u16 = 0x14a;

// Absolute multitouch axes
pub const ABS_MT_SLOT: u16 = 0x2f;
pub const ABS_MT_TOUCH_MAJOR: u16 = 0x30;
pub const ABS_MT_POSITION_X: u16 = 0x35;
pub const ABS_MT_POSITION_Y: u16 = 0x36;
pub const ABS_MT_TRACKING_ID: u16 = 0x39;
pub const ABS_MT_PRESSURE: u16 = 0x3a;

/// Tracking id value that releases a slot.
pub const TRACKING_ID_RELEASE: i32 = -1;

/// An (event type, event code) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventCode {
    pub kind: u16,
    pub code: u16,
}

impl EventCode {
    pub const SYN_REPORT: EventCode = EventCode::new(EV_SYN, SYN_REPORT);
    pub const BTN_TOUCH: EventCode = EventCode::new(EV_KEY, BTN_TOUCH);
    pub const MT_SLOT: EventCode = EventCode::new(EV_ABS, ABS_MT_SLOT);
    pub const MT_TOUCH_MAJOR: EventCode = EventCode::new(EV_ABS, ABS_MT_TOUCH_MAJOR);
    pub const MT_POSITION_X: EventCode = EventCode::new(EV_ABS, ABS_MT_POSITION_X);
    pub const MT_POSITION_Y: EventCode = EventCode::new(EV_ABS, ABS_MT_POSITION_Y);
    pub const MT_TRACKING_ID: EventCode = EventCode::new(EV_ABS, ABS_MT_TRACKING_ID);
    pub const MT_PRESSURE: EventCode = EventCode::new(EV_ABS, ABS_MT_PRESSURE);

    pub const fn new(kind: u16, code: u16) -> Self {
        Self { kind, code }
    }

    /// Look up a code by its kernel name, e.g. `"ABS_MT_POSITION_X"`.
    pub fn from_name(name: &str) -> Option<Self> {
        let code = match name {
            "SYN_REPORT" => Self::SYN_REPORT,
            "BTN_TOUCH" => Self::BTN_TOUCH,
            "ABS_MT_SLOT" => Self::MT_SLOT,
            "ABS_MT_TOUCH_MAJOR" => Self::MT_TOUCH_MAJOR,
            "ABS_MT_POSITION_X" => Self::MT_POSITION_X,
            "ABS_MT_POSITION_Y" => Self::MT_POSITION_Y,
            "ABS_MT_TRACKING_ID" => Self::MT_TRACKING_ID,
            "ABS_MT_PRESSURE" => Self::MT_PRESSURE,
            _ => return None,
        };
        Some(code)
    }

    /// Kernel name of a known code.
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::SYN_REPORT => "SYN_REPORT",
            Self::BTN_TOUCH => "BTN_TOUCH",
            Self::MT_SLOT => "ABS_MT_SLOT",
            Self::MT_TOUCH_MAJOR => "ABS_MT_TOUCH_MAJOR",
            Self::MT_POSITION_X => "ABS_MT_POSITION_X",
            Self::MT_POSITION_Y => "ABS_MT_POSITION_Y",
            Self::MT_TRACKING_ID => "ABS_MT_TRACKING_ID",
            Self::MT_PRESSURE => "ABS_MT_PRESSURE",
            _ => return None,
        };
        Some(name)
    }

    /// True for absolute axis codes carrying position, pressure or size.
    pub fn is_axis(&self) -> bool {
        matches!(
            *self,
            Self::MT_POSITION_X | Self::MT_POSITION_Y | Self::MT_PRESSURE | Self::MT_TOUCH_MAJOR
        )
    }
}

impl std::fmt::Display for EventCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:04x}:{:04x}", self.kind, self.code),
        }
    }
}
