//! Device description
//!
//! Event codes of the type-B multitouch protocol, the capabilities of a
//! touchscreen node and their discovery from `getevent -pl` listings.

pub mod codes;
pub mod capabilities;
pub mod discovery;

pub use capabilities::{AxisRange, DeviceCapabilities};
pub use codes::EventCode;
pub use discovery::{find_touchscreen, parse_getevent, DiscoveredDevice};
