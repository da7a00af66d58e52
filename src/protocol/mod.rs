//! Device protocol
//!
//! Event frames, sync-terminated batches, their binary `input_event`
//! encoding and the stateful type-B multitouch encoder.

pub mod frame;
pub mod encoder;

pub use encoder::{ProtocolEncoder, SlotTable, TouchSlot};
pub use frame::{BatchBuilder, EventFrame, FrameBatch, RecordLayout};
