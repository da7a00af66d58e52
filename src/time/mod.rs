//! Gesture timing primitives
//!
//! This module provides:
//! - Microsecond timestamps relative to the start of a gesture
//! - A pacing clock abstraction (wall clock or manual)

pub mod timebase;

pub use timebase::{Clock, ManualClock, MonotonicClock, Timestamp};
