//! Gesture Timebase
//!
//! Timestamps in this crate are offsets from the start of one gesture, kept
//! as whole microseconds. Pacing against real time goes through the
//! [`Clock`] trait so that script rendering and tests can run on a manual
//! clock without sleeping.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A gesture-relative timestamp in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The gesture origin.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from microseconds since the gesture origin.
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Create a timestamp from a duration since the gesture origin.
    #[inline]
    pub fn from_duration(d: Duration) -> Self {
        Self(d.as_micros().min(u64::MAX as u128) as u64)
    }

    /// Microseconds since the gesture origin.
    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Milliseconds since the gesture origin.
    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000
    }

    /// Offset as a std duration.
    #[inline]
    pub const fn as_duration(&self) -> Duration {
        Duration::from_micros(self.0)
    }

    /// Split into `(seconds, microseconds)`, the layout of a `timeval`.
    #[inline]
    pub const fn as_timeval(&self) -> (u64, u64) {
        (self.0 / 1_000_000, self.0 % 1_000_000)
    }

    /// Duration since an earlier timestamp. Saturates to zero.
    #[inline]
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }

    /// Check if this timestamp is strictly after another.
    #[inline]
    pub fn is_after(&self, other: Timestamp) -> bool {
        self.0 > other.0
    }

    /// Advance by a duration, saturating.
    #[inline]
    pub fn advanced_by(&self, d: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(d.as_micros().min(u64::MAX as u128) as u64))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (secs, micros) = self.as_timeval();
        write!(f, "{}.{:06}", secs, micros)
    }
}

impl serde::Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let micros = u64::deserialize(deserializer)?;
        Ok(Timestamp(micros))
    }
}

/// Source of elapsed time for pacing a gesture.
///
/// `elapsed` must never go backward.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin.
    fn elapsed(&self) -> Duration;

    /// Block the calling thread for `d`.
    fn sleep(&self, d: Duration);
}

/// Wall-clock pacing backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// A clock that only moves when slept on.
///
/// Used when rendering scripts (the consumer replays the delays) and in
/// tests. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward without a sleep call.
    pub fn advance(&self, d: Duration) {
        let mut now = self.now.lock();
        *now = now.saturating_add(d);
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        *self.now.lock()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
