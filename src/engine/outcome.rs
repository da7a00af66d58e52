//! Gesture phases and results.

use crate::gesture::types::Mode;
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// States of one gesture run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GesturePhase {
    Idle,
    Planning,
    Emitting,
    Releasing,
    Done,
    Failed,
}

impl GesturePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GesturePhase::Done | GesturePhase::Failed)
    }

    /// Legal forward transitions. Nothing returns to `Planning` once
    /// emission has begun.
    pub fn can_transition_to(&self, next: GesturePhase) -> bool {
        use GesturePhase::*;
        matches!(
            (self, next),
            (Idle, Planning)
                | (Idle, Failed)
                | (Planning, Emitting)
                | (Planning, Failed)
                | (Emitting, Releasing)
                | (Releasing, Done)
                | (Releasing, Failed)
        )
    }
}

impl fmt::Display for GesturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GesturePhase::Idle => "idle",
            GesturePhase::Planning => "planning",
            GesturePhase::Emitting => "emitting",
            GesturePhase::Releasing => "releasing",
            GesturePhase::Done => "done",
            GesturePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a completed gesture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GestureReport {
    /// "tap" or "swipe"
    pub kind: &'static str,
    pub mode: Mode,
    /// Planned points
    pub points: usize,
    /// Batches written to the device
    pub batches: usize,
    /// Frames written to the device
    pub frames: usize,
    /// Touch-down to lift
    pub duration: Duration,
    /// Delay before touch-down
    pub lead_in: Duration,
    pub slot: u32,
    pub tracking_id: i32,
    /// Every state visited, in order
    pub trace: Vec<GesturePhase>,
}

/// Why a gesture failed and what happened during cleanup.
#[derive(Debug)]
pub struct GestureFailure {
    pub reason: Error,
    /// Phase in which the failure occurred
    pub phase: GesturePhase,
    /// Error raised while releasing, reported next to `reason`
    pub cleanup_error: Option<Error>,
    /// Frames that reached the device before the failure (release included)
    pub frames: usize,
    pub trace: Vec<GesturePhase>,
}

/// Result of [`Injector::perform`](crate::engine::Injector::perform).
#[derive(Debug)]
pub enum GestureOutcome {
    Done(GestureReport),
    Failed(GestureFailure),
}

impl GestureOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, GestureOutcome::Done(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            GestureOutcome::Failed(GestureFailure {
                reason: Error::Cancelled,
                ..
            })
        )
    }

    pub fn trace(&self) -> &[GesturePhase] {
        match self {
            GestureOutcome::Done(report) => &report.trace,
            GestureOutcome::Failed(failure) => &failure.trace,
        }
    }

    pub fn report(&self) -> Option<&GestureReport> {
        match self {
            GestureOutcome::Done(report) => Some(report),
            GestureOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&GestureFailure> {
        match self {
            GestureOutcome::Done(_) => None,
            GestureOutcome::Failed(failure) => Some(failure),
        }
    }

    /// Collapse into a `Result`, keeping only the primary reason.
    pub fn into_result(self) -> Result<GestureReport> {
        match self {
            GestureOutcome::Done(report) => Ok(report),
            GestureOutcome::Failed(failure) => Err(failure.reason),
        }
    }
}

impl fmt::Display for GestureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GestureOutcome::Done(r) => write!(
                f,
                "{} done: {} points, {} batches, {} frames in {:?}",
                r.kind, r.points, r.batches, r.frames, r.duration
            ),
            GestureOutcome::Failed(failure) => {
                write!(f, "failed while {}: {}", failure.phase, failure.reason)?;
                if let Some(cleanup) = &failure.cleanup_error {
                    write!(f, " (cleanup also failed: {})", cleanup)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use GesturePhase::*;
        assert!(Idle.can_transition_to(Planning));
        assert!(Planning.can_transition_to(Emitting));
        assert!(Releasing.can_transition_to(Failed));
        assert!(!Emitting.can_transition_to(Planning));
        assert!(!Emitting.can_transition_to(Done));
        assert!(!Done.can_transition_to(Idle));
        assert!(Done.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn test_failure_display_keeps_both_errors() {
        let outcome = GestureOutcome::Failed(GestureFailure {
            reason: Error::Cancelled,
            phase: GesturePhase::Emitting,
            cleanup_error: Some(Error::Config("x".to_string())),
            frames: 0,
            trace: vec![GesturePhase::Idle, GesturePhase::Failed],
        });
        assert!(outcome.is_cancelled());
        let text = outcome.to_string();
        assert!(text.contains("emitting"));
        assert!(text.contains("Gesture cancelled"));
        assert!(text.contains("cleanup also failed"));
        assert!(matches!(outcome.into_result(), Err(Error::Cancelled)));
    }
}
