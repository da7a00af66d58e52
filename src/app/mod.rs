//! Application Layer
//!
//! The `touch-inject` command line and the TOML configuration that feeds
//! the planner, timing model, transport and declared device capabilities.

pub mod cli;
pub mod config;

pub use cli::{Cli, Commands, GestureOpts};
pub use config::Config;
