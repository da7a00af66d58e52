//! # Touch Injector
//!
//! Human-like multitouch gesture injection for evdev touchscreen nodes
//! (Linux and rooted Android devices).
//!
//! ## Overview
//!
//! A logical gesture ("tap here", "swipe from here to there") is turned into
//! a stream of timed, type-B multitouch protocol records written to a
//! device's input node. With humanization enabled the motion carries the
//! small imperfections of a real finger: a landing offset and settle path on
//! taps, curved paths and tremor on swipes, ease-in/ease-out timing and a
//! wandering contact pressure. With humanization disabled the output is
//! bit-exact and deterministic.
//!
//! ## Quick Start
//!
//! ```no_run
//! use touch_injector::{DeviceCapabilities, GestureSpec, Injector, Point};
//! use touch_injector::transport::DeviceTransport;
//!
//! let caps = DeviceCapabilities::touchscreen(1080, 2400);
//! let mut injector = Injector::new(caps);
//!
//! let spec = GestureSpec::tap(Point::new(500.0, 800.0)).humanized(true);
//! let transport = DeviceTransport::open_evdev("/dev/input/event2").expect("device");
//! let outcome = injector.perform(&spec, transport);
//! println!("{}", outcome);
//! ```
//!
//! ## Architecture
//!
//! - [`device`]: capabilities, event codes and `getevent -pl` discovery
//! - [`gesture`]: gesture requests, geometry planning and the timing model
//! - [`protocol`]: event frames, batches and the type-B encoder
//! - [`transport`]: device sinks, batch flushing and write retries
//! - [`engine`]: the gesture state machine, cancellation and cleanup
//! - [`time`]: gesture-relative timestamps and pacing clocks
//! - [`app`]: CLI and configuration management
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  Geometry   │───▶│   Timing    │───▶│  Protocol   │───▶│   Device    │
//! │  Planner    │    │   Model     │    │  Encoder    │    │  Transport  │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!        ▲                                                        │
//!        └──────────────── Orchestrator (engine) ─────────────────┘
//! ```

pub mod time;
pub mod device;
pub mod gesture;
pub mod protocol;
pub mod transport;
pub mod engine;
pub mod app;

// Re-export commonly used types
pub use device::capabilities::{AxisRange, DeviceCapabilities};
pub use engine::{CancelToken, GestureOutcome, GesturePhase, Injector};
pub use gesture::types::{DurationBounds, GestureKind, GestureSpec, Mode, Point};
pub use protocol::frame::{EventFrame, FrameBatch};
pub use time::timebase::Timestamp;

/// Result type alias for the touch injector
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the touch injector
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Device unavailable: {path}: {reason}")]
    DeviceUnavailable {
        path: std::path::PathBuf,
        reason: String,
    },

    #[error("Protocol write error after {attempts} attempt(s): {source}")]
    ProtocolWrite {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("No free multitouch slot (device has {max_slots})")]
    SlotExhausted { max_slots: u32 },

    #[error("Gesture cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability discovery error: {0}")]
    Discovery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
