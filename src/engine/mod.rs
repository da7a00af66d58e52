//! Gesture engine
//!
//! The [`Injector`] sequences planning, emission and release for each
//! gesture and reports a [`GestureOutcome`]. Slot cleanup is guaranteed on
//! every exit path, cancellation included.

pub mod cancel;
pub mod outcome;
pub mod orchestrator;

pub use cancel::CancelToken;
pub use orchestrator::Injector;
pub use outcome::{GestureFailure, GestureOutcome, GesturePhase, GestureReport};
