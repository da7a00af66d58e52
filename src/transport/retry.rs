//! Write retry with exponential backoff.
//!
//! Transient device errors (interrupted, would-block, timed out) are
//! retried with backoff `initial × multiplier^attempt`. A short write is
//! never retried: part of the batch already reached the device and sending
//! it again would duplicate records. Anything else, or running out of
//! retries, surfaces as [`Error::ProtocolWrite`](crate::Error::ProtocolWrite).

use crate::time::timebase::Clock;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use tracing::warn;

/// Longest single wait between attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Backoff policy for device writes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Fail on the first error.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt as i32);
        Duration::try_from_secs_f64(self.initial_backoff.as_secs_f64() * factor)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}

/// Errors worth another attempt.
pub fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// True when a failed write may have left part of its batch on the device.
pub fn is_partial_write(err: &Error) -> bool {
    matches!(err, Error::ProtocolWrite { source, .. } if source.kind() == io::ErrorKind::WriteZero)
}

/// Run `op` until it succeeds, a non-transient error occurs, or retries run
/// out. Returns the number of attempts used.
pub fn write_with_retry<F>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    context: &str,
    mut op: F,
) -> Result<u32>
where
    F: FnMut() -> io::Result<()>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(()) => return Ok(attempt),
            Err(e) if is_transient(e.kind()) && attempt <= policy.max_retries => {
                let delay = policy.backoff(attempt - 1);
                warn!(
                    "{}: transient write error ({}), retrying in {:?}",
                    context, e, delay
                );
                clock.sleep(delay);
            }
            Err(e) => {
                if is_transient(e.kind()) {
                    warn!("{}: failed after {} attempt(s)", context, attempt);
                } else {
                    warn!("{}: non-retriable write error ({})", context, e);
                }
                return Err(Error::ProtocolWrite {
                    attempts: attempt,
                    source: e,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::timebase::ManualClock;

    #[test]
    fn test_backoff_sequence() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(2));
        assert_eq!(policy.backoff(1), Duration::from_millis(4));
        assert_eq!(policy.backoff(2), Duration::from_millis(8));
    }

    #[test]
    fn test_transient_kinds() {
        assert!(is_transient(io::ErrorKind::Interrupted));
        assert!(is_transient(io::ErrorKind::WouldBlock));
        assert!(is_transient(io::ErrorKind::TimedOut));
        assert!(!is_transient(io::ErrorKind::WriteZero));
        assert!(!is_transient(io::ErrorKind::PermissionDenied));
        assert!(!is_transient(io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn test_recovers_from_transient_errors() {
        let clock = ManualClock::new();
        let mut failures = 2;
        let attempts = write_with_retry(&RetryPolicy::default(), &clock, "test", || {
            if failures > 0 {
                failures -= 1;
                Err(io::Error::from(io::ErrorKind::Interrupted))
            } else {
                Ok(())
            }
        })
        .unwrap();

        assert_eq!(attempts, 3);
        // 2ms + 4ms of backoff
        assert_eq!(clock.elapsed(), Duration::from_millis(6));
    }

    #[test]
    fn test_exhausted_retries_surface_protocol_write() {
        let clock = ManualClock::new();
        let err = write_with_retry(&RetryPolicy::default(), &clock, "test", || {
            Err(io::Error::from(io::ErrorKind::WouldBlock))
        })
        .unwrap_err();

        match err {
            Error::ProtocolWrite { attempts, source } => {
                assert_eq!(attempts, 4);
                assert_eq!(source.kind(), io::ErrorKind::WouldBlock);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_transient_error_is_not_retried() {
        let clock = ManualClock::new();
        let mut calls = 0;
        let err = write_with_retry(&RetryPolicy::default(), &clock, "test", || {
            calls += 1;
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        })
        .unwrap_err();

        assert_eq!(calls, 1);
        assert!(matches!(err, Error::ProtocolWrite { attempts: 1, .. }));
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_short_write_is_not_resent() {
        let clock = ManualClock::new();
        let mut calls = 0;
        let err = write_with_retry(&RetryPolicy::default(), &clock, "test", || {
            calls += 1;
            Err(io::Error::from(io::ErrorKind::WriteZero))
        })
        .unwrap_err();

        assert_eq!(calls, 1);
        assert!(is_partial_write(&err));
        assert!(!is_partial_write(&Error::Cancelled));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(2),
            multiplier: f64::INFINITY,
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(2));
        assert_eq!(policy.backoff(1), MAX_BACKOFF);

        let huge = RetryPolicy {
            multiplier: 1e300,
            ..policy
        };
        assert_eq!(huge.backoff(2), MAX_BACKOFF);
    }
}
