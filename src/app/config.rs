//! Configuration Management

use crate::device::capabilities::{AxisRange, DeviceCapabilities, MAX_SLOTS};
use crate::device::codes::EventCode;
use crate::gesture::planner::PlannerSettings;
use crate::gesture::timing::TimingSettings;
use crate::gesture::types::DurationBounds;
use crate::protocol::frame::RecordLayout;
use crate::transport::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Target device
    #[serde(default)]
    pub device: DeviceConfig,
    /// Path, pressure and lead-in humanization
    #[serde(default)]
    pub humanize: HumanizeConfig,
    /// Report rate and duration bounds
    #[serde(default)]
    pub timing: TimingConfig,
    /// Write retries
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Record layout selection; `auto` follows the host's pointer width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LayoutChoice {
    #[default]
    Auto,
    Bits64,
    Bits32,
}

/// Device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Input node written by gesture commands
    pub path: String,
    /// `input_event` layout of the target
    pub record_layout: LayoutChoice,
    /// Declared axis maxima; when both are set discovery is skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_max: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_max: Option<i32>,
    pub pressure_max: i32,
    pub touch_major_max: i32,
    pub max_slots: u32,
    pub tracking_id_max: i32,
    /// How far outside the axes a request may lie and still be clamped
    pub clamp_tolerance: f64,
}

/// Humanization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanizeConfig {
    /// Humanize gestures unless the command says otherwise
    pub enabled: bool,
    pub tap_jitter_radius: f64,
    pub settle_max_moves: u32,
    pub settle_final_radius: f64,
    pub swipe_curve_radius: f64,
    pub tremor_amplitude: f64,
    pub endpoint_jitter: f64,
    /// Fraction of max pressure, `[low, high]`
    pub pressure_range: [f64; 2],
    /// Fraction of max contact size, `[low, high]`
    pub contact_size_range: [f64; 2],
    pub pressure_walk: f64,
    pub timing_jitter: f64,
    /// Delay before touch-down (ms), `[low, high]`; `[0, 0]` disables it
    pub lead_in_ms: [u64; 2],
}

/// Timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Shortest gap between reports (µs)
    pub min_frame_interval_us: u64,
    pub point_rate_hz: f64,
    pub easing_strength: f64,
    pub tap_duration_ms: [u64; 2],
    pub swipe_duration_ms: [u64; 2],
    /// Device units per millisecond
    pub swipe_speed: f64,
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: "/dev/input/event2".to_string(),
            record_layout: LayoutChoice::Auto,
            x_max: None,
            y_max: None,
            pressure_max: 255,
            touch_major_max: 255,
            max_slots: 10,
            tracking_id_max: 65535,
            clamp_tolerance: 8.0,
        }
    }
}

impl Default for HumanizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tap_jitter_radius: 3.0,
            settle_max_moves: 2,
            settle_final_radius: 0.5,
            swipe_curve_radius: 40.0,
            tremor_amplitude: 1.5,
            endpoint_jitter: 2.0,
            pressure_range: [0.7, 1.0],
            contact_size_range: [0.3, 0.6],
            pressure_walk: 0.02,
            timing_jitter: 0.15,
            lead_in_ms: [50, 150],
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_frame_interval_us: 5_000,
            point_rate_hz: 120.0,
            easing_strength: 1.5,
            tap_duration_ms: [80, 180],
            swipe_duration_ms: [300, 1200],
            swipe_speed: 1.5,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 2,
            backoff_multiplier: 2.0,
        }
    }
}

fn check_fraction_range(name: &str, range: [f64; 2]) -> Result<(), crate::Error> {
    let [lo, hi] = range;
    if !(lo > 0.0 && lo <= hi && hi <= 1.0) {
        return Err(crate::Error::Config(format!(
            "{} must satisfy 0 < low <= high <= 1, got [{}, {}]", name, lo, hi
        )));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<(), crate::Error> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(crate::Error::Config(format!(
            "{} must be a finite value >= 0, got {}", name, value
        )));
    }
    Ok(())
}

fn check_duration_range(name: &str, range: [u64; 2]) -> Result<(), crate::Error> {
    if range[0] > range[1] || range[1] == 0 {
        return Err(crate::Error::Config(format!(
            "{} must be [min, max] with min <= max and max > 0, got {:?}", name, range
        )));
    }
    Ok(())
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        let d = &self.device;
        if d.path.trim().is_empty() {
            return Err(crate::Error::Config("device path must not be empty".to_string()));
        }
        match (d.x_max, d.y_max) {
            (Some(x), Some(y)) if x <= 0 || y <= 0 => {
                return Err(crate::Error::Config(format!(
                    "axis maxima must be > 0, got x_max={} y_max={}", x, y
                )));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(crate::Error::Config(
                    "x_max and y_max must be set together".to_string(),
                ));
            }
            _ => {}
        }
        if d.pressure_max <= 0 || d.touch_major_max <= 0 {
            return Err(crate::Error::Config(
                "pressure_max and touch_major_max must be > 0".to_string(),
            ));
        }
        if d.max_slots == 0 || d.max_slots > MAX_SLOTS {
            return Err(crate::Error::Config(format!(
                "max_slots must be in [1, {}], got {}",
                MAX_SLOTS, d.max_slots
            )));
        }
        if d.tracking_id_max <= 0 {
            return Err(crate::Error::Config("tracking_id_max must be > 0".to_string()));
        }
        check_non_negative("clamp_tolerance", d.clamp_tolerance)?;

        let h = &self.humanize;
        check_non_negative("tap_jitter_radius", h.tap_jitter_radius)?;
        check_non_negative("settle_final_radius", h.settle_final_radius)?;
        check_non_negative("swipe_curve_radius", h.swipe_curve_radius)?;
        check_non_negative("tremor_amplitude", h.tremor_amplitude)?;
        check_non_negative("endpoint_jitter", h.endpoint_jitter)?;
        check_non_negative("pressure_walk", h.pressure_walk)?;
        check_fraction_range("pressure_range", h.pressure_range)?;
        check_fraction_range("contact_size_range", h.contact_size_range)?;
        if !(0.0..1.0).contains(&h.timing_jitter) {
            return Err(crate::Error::Config(format!(
                "timing_jitter must be in [0, 1), got {}", h.timing_jitter
            )));
        }
        if h.lead_in_ms[0] > h.lead_in_ms[1] {
            return Err(crate::Error::Config(format!(
                "lead_in_ms must be [min, max] with min <= max, got {:?}", h.lead_in_ms
            )));
        }

        let t = &self.timing;
        if t.min_frame_interval_us == 0 {
            return Err(crate::Error::Config("min_frame_interval_us must be > 0".to_string()));
        }
        if !(t.point_rate_hz > 0.0 && t.point_rate_hz <= 1000.0) {
            return Err(crate::Error::Config(format!(
                "point_rate_hz must be in (0, 1000], got {}", t.point_rate_hz
            )));
        }
        check_non_negative("easing_strength", t.easing_strength)?;
        check_duration_range("tap_duration_ms", t.tap_duration_ms)?;
        check_duration_range("swipe_duration_ms", t.swipe_duration_ms)?;
        if !(t.swipe_speed > 0.0 && t.swipe_speed.is_finite()) {
            return Err(crate::Error::Config(format!(
                "swipe_speed must be > 0, got {}", t.swipe_speed
            )));
        }

        if !(1.0..=16.0).contains(&self.transport.backoff_multiplier) {
            return Err(crate::Error::Config(format!(
                "backoff_multiplier must be in [1, 16], got {}", self.transport.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Load config from file
    pub fn load(path: &PathBuf) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &PathBuf) -> Result<(), crate::Error> {
        let content = self.to_toml()?;

        // Create parent directories
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save to default location
    pub fn save_default(&self) -> Result<(), crate::Error> {
        self.save(&Self::default_path())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".touch_injector").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    pub fn planner_settings(&self) -> PlannerSettings {
        let h = &self.humanize;
        let t = &self.timing;
        PlannerSettings {
            tap_jitter_radius: h.tap_jitter_radius,
            settle_max_moves: h.settle_max_moves,
            settle_final_radius: h.settle_final_radius,
            swipe_curve_radius: h.swipe_curve_radius,
            tremor_amplitude: h.tremor_amplitude,
            endpoint_jitter: h.endpoint_jitter,
            pressure_range: (h.pressure_range[0], h.pressure_range[1]),
            contact_size_range: (h.contact_size_range[0], h.contact_size_range[1]),
            point_rate_hz: t.point_rate_hz,
            swipe_speed: t.swipe_speed,
            timing_jitter: h.timing_jitter,
            tap_duration: DurationBounds::from_millis(t.tap_duration_ms[0], t.tap_duration_ms[1]),
            swipe_duration: DurationBounds::from_millis(
                t.swipe_duration_ms[0],
                t.swipe_duration_ms[1],
            ),
            clamp_tolerance: self.device.clamp_tolerance,
        }
    }

    pub fn timing_settings(&self) -> TimingSettings {
        TimingSettings {
            min_frame_interval: Duration::from_micros(self.timing.min_frame_interval_us),
            point_rate_hz: self.timing.point_rate_hz,
            easing_strength: self.timing.easing_strength,
            timing_jitter: self.humanize.timing_jitter,
            pressure_walk: self.humanize.pressure_walk,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.transport.max_retries,
            initial_backoff: Duration::from_millis(self.transport.initial_backoff_ms),
            multiplier: self.transport.backoff_multiplier,
        }
    }

    /// Lead-in bounds, or `None` when disabled.
    pub fn lead_in(&self) -> Option<DurationBounds> {
        let [lo, hi] = self.humanize.lead_in_ms;
        if hi == 0 {
            None
        } else {
            Some(DurationBounds::from_millis(lo, hi))
        }
    }

    pub fn record_layout(&self) -> RecordLayout {
        match self.device.record_layout {
            LayoutChoice::Auto => RecordLayout::native(),
            LayoutChoice::Bits64 => RecordLayout::Bits64,
            LayoutChoice::Bits32 => RecordLayout::Bits32,
        }
    }

    /// Capabilities declared in `[device]`, if the axes are given.
    pub fn declared_capabilities(&self) -> Result<Option<DeviceCapabilities>, crate::Error> {
        let d = &self.device;
        let (Some(x_max), Some(y_max)) = (d.x_max, d.y_max) else {
            return Ok(None);
        };

        let mut caps = DeviceCapabilities::touchscreen(x_max, y_max);
        caps.x = AxisRange::new(0, x_max);
        caps.y = AxisRange::new(0, y_max);
        caps.pressure_max = d.pressure_max;
        caps.touch_major_max = d.touch_major_max;
        caps.max_slots = d.max_slots;
        caps.tracking_id_max = d.tracking_id_max;
        if d.max_slots <= 1 {
            caps.codes.remove(&EventCode::MT_SLOT);
        }
        caps.validate()?;
        Ok(Some(caps))
    }
}
