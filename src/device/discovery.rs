//! Capability discovery from `getevent -pl`
//!
//! Android's `getevent -pl` prints every input node with its event codes
//! and absolute axis ranges. This module parses that listing and picks the
//! touchscreen, the first node reporting `ABS_MT_POSITION_X`.

use super::capabilities::{AxisRange, DeviceCapabilities, MAX_SLOTS};
use super::codes::EventCode;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::debug;

/// `add device 2: /dev/input/event2`
static DEVICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^add device \d+:\s*(\S+)").expect("valid regex")
});

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*name:\s*"(.*)""#).expect("valid regex"));

/// `ABS_MT_POSITION_X : value 0, min 0, max 1079, ...`
static ABS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(ABS_MT_[A-Z_]+)\s*:\s*value\s+(-?\d+),\s*min\s+(-?\d+),\s*max\s+(-?\d+)")
        .expect("valid regex")
});

static BTN_TOUCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bBTN_TOUCH\b").expect("valid regex"));

/// One input node from a `getevent -pl` listing.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// Device node path, e.g. `/dev/input/event2`
    pub path: String,
    /// Driver-reported name
    pub name: Option<String>,
    /// Multitouch axes reported by the node, keyed by kernel name
    pub axes: BTreeMap<String, AxisRange>,
    /// Whether the node reports `BTN_TOUCH`
    pub has_btn_touch: bool,
}

impl DiscoveredDevice {
    fn new(path: String) -> Self {
        Self {
            path,
            name: None,
            axes: BTreeMap::new(),
            has_btn_touch: false,
        }
    }

    /// True when the node reports multitouch positions.
    pub fn is_touchscreen(&self) -> bool {
        self.axes.contains_key("ABS_MT_POSITION_X") && self.axes.contains_key("ABS_MT_POSITION_Y")
    }

    /// Build capabilities for a touchscreen node.
    pub fn capabilities(&self) -> crate::Result<DeviceCapabilities> {
        let axis = |name: &str| {
            self.axes.get(name).copied().ok_or_else(|| {
                crate::Error::Discovery(format!("{} does not report {}", self.path, name))
            })
        };

        let x = axis("ABS_MT_POSITION_X")?;
        let y = axis("ABS_MT_POSITION_Y")?;

        let mut codes: BTreeSet<EventCode> = BTreeSet::new();
        codes.insert(EventCode::SYN_REPORT);
        for name in self.axes.keys() {
            if let Some(code) = EventCode::from_name(name) {
                codes.insert(code);
            }
        }
        if self.has_btn_touch {
            codes.insert(EventCode::BTN_TOUCH);
        }

        let caps = DeviceCapabilities {
            x,
            y,
            pressure_max: self.axes.get("ABS_MT_PRESSURE").map_or(255, |a| a.max),
            touch_major_max: self.axes.get("ABS_MT_TOUCH_MAJOR").map_or(255, |a| a.max),
            max_slots: self
                .axes
                .get("ABS_MT_SLOT")
                .map_or(1, slot_count),
            tracking_id_max: self.axes.get("ABS_MT_TRACKING_ID").map_or(65535, |a| a.max),
            codes,
        };
        caps.validate()?;
        Ok(caps)
    }
}

/// Slots in an `ABS_MT_SLOT` range, within `[1, MAX_SLOTS]`.
fn slot_count(range: &AxisRange) -> u32 {
    let span = i64::from(range.max) - i64::from(range.min) + 1;
    span.clamp(1, i64::from(MAX_SLOTS)) as u32
}

/// Parse a full `getevent -pl` listing.
pub fn parse_getevent(listing: &str) -> Vec<DiscoveredDevice> {
    let mut devices = Vec::new();
    let mut current: Option<DiscoveredDevice> = None;

    for line in listing.lines() {
        if let Some(caps) = DEVICE_RE.captures(line) {
            if let Some(done) = current.take() {
                devices.push(done);
            }
            current = Some(DiscoveredDevice::new(caps[1].to_string()));
            continue;
        }

        let Some(device) = current.as_mut() else {
            continue;
        };

        if let Some(caps) = NAME_RE.captures(line) {
            device.name = Some(caps[1].to_string());
        } else if let Some(caps) = ABS_RE.captures(line) {
            let (min, max) = match (caps[3].parse::<i32>(), caps[4].parse::<i32>()) {
                (Ok(min), Ok(max)) => (min, max),
                _ => continue,
            };
            device.axes.insert(caps[1].to_string(), AxisRange::new(min, max));
        } else if BTN_TOUCH_RE.is_match(line) {
            device.has_btn_touch = true;
        }
    }

    if let Some(done) = current {
        devices.push(done);
    }
    devices
}

/// Find the touchscreen in a `getevent -pl` listing.
pub fn find_touchscreen(listing: &str) -> crate::Result<DiscoveredDevice> {
    let devices = parse_getevent(listing);
    debug!("getevent listing contains {} device(s)", devices.len());
    devices
        .into_iter()
        .find(DiscoveredDevice::is_touchscreen)
        .ok_or_else(|| crate::Error::Discovery("no device reports ABS_MT_POSITION_X".to_string()))
}
