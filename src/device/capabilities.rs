//! Device Capabilities
//!
//! What the connected touchscreen can report: axis ranges, pressure and
//! contact-size maxima, slot count and the supported event codes. Captured
//! once per connection and read-only afterwards.

use super::codes::EventCode;
use crate::gesture::types::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Inclusive range of an absolute axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Check if a device value lies inside the range.
    pub fn contains(&self, value: i32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Distance from `value` to the nearest end of the range (0 inside).
    pub fn overshoot(&self, value: f64) -> f64 {
        if value < self.min as f64 {
            self.min as f64 - value
        } else if value > self.max as f64 {
            value - self.max as f64
        } else {
            0.0
        }
    }

    /// Round and clamp a planned coordinate into the range.
    pub fn clamp(&self, value: f64) -> i32 {
        let rounded = value.round();
        if rounded <= self.min as f64 {
            self.min
        } else if rounded >= self.max as f64 {
            self.max
        } else {
            rounded as i32
        }
    }

    /// Width of the range in device units.
    pub fn span(&self) -> i64 {
        i64::from(self.max) - i64::from(self.min)
    }
}

/// Upper bound on multitouch slots. Kernel drivers report far fewer.
pub const MAX_SLOTS: u32 = 256;

/// Capabilities of one touchscreen input node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// `ABS_MT_POSITION_X` range
    pub x: AxisRange,
    /// `ABS_MT_POSITION_Y` range
    pub y: AxisRange,
    /// `ABS_MT_PRESSURE` maximum
    pub pressure_max: i32,
    /// `ABS_MT_TOUCH_MAJOR` maximum
    pub touch_major_max: i32,
    /// Number of multitouch slots (`ABS_MT_SLOT` max + 1)
    pub max_slots: u32,
    /// `ABS_MT_TRACKING_ID` maximum
    pub tracking_id_max: i32,
    /// Event codes the node reports
    pub codes: BTreeSet<EventCode>,
}

impl DeviceCapabilities {
    /// A full-featured type-B touchscreen with axes `[0, x_max]` and
    /// `[0, y_max]`, 10 slots, and 8-bit pressure and contact size.
    pub fn touchscreen(x_max: i32, y_max: i32) -> Self {
        let codes = [
            EventCode::SYN_REPORT,
            EventCode::BTN_TOUCH,
            EventCode::MT_SLOT,
            EventCode::MT_TOUCH_MAJOR,
            EventCode::MT_POSITION_X,
            EventCode::MT_POSITION_Y,
            EventCode::MT_TRACKING_ID,
            EventCode::MT_PRESSURE,
        ]
        .into_iter()
        .collect();

        Self {
            x: AxisRange::new(0, x_max),
            y: AxisRange::new(0, y_max),
            pressure_max: 255,
            touch_major_max: 255,
            max_slots: 10,
            tracking_id_max: 65535,
            codes,
        }
    }

    /// Check if the device reports an event code.
    pub fn supports(&self, code: EventCode) -> bool {
        self.codes.contains(&code)
    }

    /// True when the node uses explicit slot selection (type B).
    pub fn has_slots(&self) -> bool {
        self.supports(EventCode::MT_SLOT)
    }

    /// How far a point lies outside the axis bounds (largest per-axis overshoot).
    pub fn overshoot(&self, point: Point) -> f64 {
        self.x.overshoot(point.x).max(self.y.overshoot(point.y))
    }

    /// Clamp a planned point into device bounds, rounding to device units.
    pub fn clamp(&self, point: Point) -> (i32, i32) {
        (self.x.clamp(point.x), self.y.clamp(point.y))
    }

    /// Scale a screen-pixel coordinate into device axis units.
    ///
    /// Many panels report a higher resolution than the display; `screen` is
    /// the display size in pixels.
    pub fn screen_to_device(&self, point: Point, screen: (u32, u32)) -> Point {
        let (w, h) = (screen.0.max(1) as f64, screen.1.max(1) as f64);
        Point::new(
            self.x.min as f64 + point.x * self.x.span() as f64 / w,
            self.y.min as f64 + point.y * self.y.span() as f64 / h,
        )
    }

    /// Check the capabilities describe a usable touchscreen.
    pub fn validate(&self) -> crate::Result<()> {
        if self.x.span() <= 0 || self.y.span() <= 0 {
            return Err(crate::Error::Discovery(format!(
                "degenerate axis ranges x={:?} y={:?}",
                self.x, self.y
            )));
        }
        if !self.supports(EventCode::MT_POSITION_X) || !self.supports(EventCode::MT_POSITION_Y) {
            return Err(crate::Error::Discovery(
                "device does not report ABS_MT_POSITION_X/Y".to_string(),
            ));
        }
        if !self.supports(EventCode::MT_TRACKING_ID) {
            return Err(crate::Error::Discovery(
                "device does not report ABS_MT_TRACKING_ID".to_string(),
            ));
        }
        if self.tracking_id_max <= 0 {
            return Err(crate::Error::Discovery(format!(
                "tracking id max must be positive, got {}",
                self.tracking_id_max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_clamp_never_wraps() {
        let axis = AxisRange::new(0, 1080);
        assert_eq!(axis.clamp(-5.0), 0);
        assert_eq!(axis.clamp(1080.4), 1080);
        assert_eq!(axis.clamp(5000.0), 1080);
        assert_eq!(axis.clamp(499.6), 500);
    }

    #[test]
    fn test_axis_overshoot() {
        let axis = AxisRange::new(0, 100);
        assert_eq!(axis.overshoot(50.0), 0.0);
        assert_eq!(axis.overshoot(-3.0), 3.0);
        assert_eq!(axis.overshoot(104.5), 4.5);
    }

    #[test]
    fn test_touchscreen_defaults() {
        let caps = DeviceCapabilities::touchscreen(1080, 2400);
        assert_eq!(caps.x, AxisRange::new(0, 1080));
        assert_eq!(caps.y, AxisRange::new(0, 2400));
        assert!(caps.has_slots());
        assert!(caps.supports(EventCode::MT_PRESSURE));
        assert!(caps.validate().is_ok());
    }

    #[test]
    fn test_screen_to_device_scaling() {
        let mut caps = DeviceCapabilities::touchscreen(4095, 4095);
        caps.x = AxisRange::new(0, 4096);
        caps.y = AxisRange::new(0, 8192);
        let p = caps.screen_to_device(Point::new(540.0, 1200.0), (1080, 2400));
        assert!((p.x - 2048.0).abs() < 1e-9);
        assert!((p.y - 4096.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_missing_position() {
        let mut caps = DeviceCapabilities::touchscreen(1080, 2400);
        caps.codes.remove(&EventCode::MT_POSITION_Y);
        assert!(caps.validate().is_err());
    }

    #[test]
    fn test_full_width_axis_span() {
        let axis = AxisRange::new(i32::MIN, i32::MAX);
        assert_eq!(axis.span(), i64::from(u32::MAX));

        let mut caps = DeviceCapabilities::touchscreen(1080, 2400);
        caps.x = axis;
        assert!(caps.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_degenerate_axis() {
        let mut caps = DeviceCapabilities::touchscreen(1080, 2400);
        caps.x = AxisRange::new(10, 10);
        assert!(caps.validate().is_err());
    }
}
