//! Gesture planning
//!
//! Geometry first, then time: the planner produces the path a finger
//! follows, the timing model decides when each point is reported and with
//! what pressure.

pub mod types;
pub mod planner;
pub mod timing;

pub use planner::{GeometryPlanner, PlannerSettings};
pub use timing::{TimingModel, TimingSettings};
pub use types::*;
