//! Gesture data model
//!
//! Requests come in as a [`GestureSpec`]; the planner turns them into a
//! [`Plan`] of [`PlannedPoint`]s and the timing model into a [`Timeline`]
//! of [`TimedPoint`]s.

use crate::time::timebase::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A coordinate in device axis units (not yet rounded or clamped).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// What the finger does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GestureKind {
    /// Press and lift at one place
    Tap { at: Point },
    /// Press, move along a path, lift
    Swipe { from: Point, to: Point },
}

impl GestureKind {
    /// A swipe that ends where it starts is a tap.
    pub fn normalized(self) -> Self {
        match self {
            GestureKind::Swipe { from, to } if from == to => GestureKind::Tap { at: from },
            other => other,
        }
    }

    pub fn start(&self) -> Point {
        match *self {
            GestureKind::Tap { at } => at,
            GestureKind::Swipe { from, .. } => from,
        }
    }

    pub fn end(&self) -> Point {
        match *self {
            GestureKind::Tap { at } => at,
            GestureKind::Swipe { to, .. } => to,
        }
    }

    pub fn is_tap(&self) -> bool {
        matches!(self.normalized(), GestureKind::Tap { .. })
    }
}

/// How faithfully the request is reproduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Mode {
    /// Bit-exact: no jitter, fixed timing and pressure
    Exact,
    /// Human-like variation in path, timing and pressure
    #[default]
    Humanized,
}

/// Inclusive bounds on total gesture duration (touch-down to lift).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationBounds {
    pub min: Duration,
    pub max: Duration,
}

impl DurationBounds {
    /// Create bounds, swapping the ends if given in reverse.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_millis(min: u64, max: u64) -> Self {
        Self::new(Duration::from_millis(min), Duration::from_millis(max))
    }

    /// Bounds that admit exactly one duration.
    pub fn fixed(d: Duration) -> Self {
        Self { min: d, max: d }
    }

    pub fn contains(&self, d: Duration) -> bool {
        d >= self.min && d <= self.max
    }

    pub fn clamp(&self, d: Duration) -> Duration {
        d.clamp(self.min, self.max)
    }

    pub fn midpoint(&self) -> Duration {
        self.min + (self.max - self.min) / 2
    }
}

/// A single gesture request from the decision layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureSpec {
    pub kind: GestureKind,
    pub mode: Mode,
    /// Overrides the configured duration bounds for this gesture
    pub duration: Option<DurationBounds>,
    /// Seed for all humanization noise; `None` draws from entropy
    pub seed: Option<u64>,
}

impl GestureSpec {
    /// A humanized tap.
    pub fn tap(at: Point) -> Self {
        Self {
            kind: GestureKind::Tap { at },
            mode: Mode::Humanized,
            duration: None,
            seed: None,
        }
    }

    /// A humanized swipe. Equal endpoints produce a tap.
    pub fn swipe(from: Point, to: Point) -> Self {
        Self {
            kind: GestureKind::Swipe { from, to }.normalized(),
            mode: Mode::Humanized,
            duration: None,
            seed: None,
        }
    }

    /// Build from a start point and optional end point (absent means tap).
    pub fn from_points(start: Point, end: Option<Point>) -> Self {
        match end {
            Some(end) => Self::swipe(start, end),
            None => Self::tap(start),
        }
    }

    pub fn humanized(mut self, humanize: bool) -> Self {
        self.mode = if humanize { Mode::Humanized } else { Mode::Exact };
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_duration(mut self, bounds: DurationBounds) -> Self {
        self.duration = Some(bounds);
        self
    }

    pub fn is_humanized(&self) -> bool {
        self.mode == Mode::Humanized
    }

    pub fn start(&self) -> Point {
        self.kind.start()
    }

    /// End point; `None` for taps.
    pub fn end(&self) -> Option<Point> {
        match self.kind.normalized() {
            GestureKind::Tap { .. } => None,
            GestureKind::Swipe { to, .. } => Some(to),
        }
    }
}

/// A point on the planned path, in device units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedPoint {
    pub x: i32,
    pub y: i32,
    /// Intended `ABS_MT_PRESSURE`
    pub pressure: i32,
    /// Intended `ABS_MT_TOUCH_MAJOR`
    pub touch_major: i32,
    /// Position in the planned sequence
    pub index: usize,
}

/// Output of the geometry planner.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub points: Vec<PlannedPoint>,
    /// Intended touch-down to lift duration
    pub target: Duration,
    /// Hard limits on the total duration
    pub bounds: DurationBounds,
    pub mode: Mode,
}

/// A planned point with its emission time and final contact values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedPoint {
    pub x: i32,
    pub y: i32,
    pub pressure: i32,
    pub touch_major: i32,
    pub index: usize,
    /// Offset from touch-down
    pub at: Timestamp,
}

impl TimedPoint {
    pub fn new(point: &PlannedPoint, at: Timestamp, pressure: i32, touch_major: i32) -> Self {
        Self {
            x: point.x,
            y: point.y,
            pressure,
            touch_major,
            index: point.index,
            at,
        }
    }
}

/// Output of the timing model.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub points: Vec<TimedPoint>,
    /// When the finger lifts; strictly after the last point
    pub lift_at: Timestamp,
}

impl Timeline {
    /// Touch-down to lift.
    pub fn duration(&self) -> Duration {
        self.lift_at.as_duration()
    }
}
