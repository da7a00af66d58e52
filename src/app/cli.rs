//! Command-Line Interface

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Touch Injector - Human-like touch gestures on evdev touchscreens
#[derive(Parser, Debug)]
#[command(name = "touch-inject")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Tap at a point
    Tap {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,

        #[command(flatten)]
        opts: GestureOpts,
    },

    /// Swipe from one point to another
    Swipe {
        #[arg(allow_negative_numbers = true)]
        x1: f64,
        #[arg(allow_negative_numbers = true)]
        y1: f64,
        #[arg(allow_negative_numbers = true)]
        x2: f64,
        #[arg(allow_negative_numbers = true)]
        y2: f64,

        /// Fixed swipe duration in milliseconds (derived from distance if omitted)
        #[arg(long)]
        duration_ms: Option<u64>,

        #[command(flatten)]
        opts: GestureOpts,
    },

    /// Press and hold at a point
    LongPress {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,

        /// Hold duration in milliseconds
        #[arg(long, default_value = "800")]
        hold_ms: u64,

        #[command(flatten)]
        opts: GestureOpts,
    },

    /// Two taps in quick succession
    DoubleTap {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,

        /// Pause between the taps in milliseconds (humanized runs vary it by ±30%)
        #[arg(long, default_value = "90")]
        gap_ms: u64,

        #[command(flatten)]
        opts: GestureOpts,
    },

    /// Show the touchscreen found in a `getevent -pl` listing
    Info {
        /// File holding `getevent -pl` output
        #[arg(short, long)]
        getevent: PathBuf,
    },

    /// View or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options shared by every gesture command
#[derive(Args, Debug, Clone, Default)]
pub struct GestureOpts {
    /// Reproduce the gesture exactly (no jitter, fixed timing and pressure)
    #[arg(long)]
    pub no_humanize: bool,

    /// Seed for humanization noise
    #[arg(long)]
    pub seed: Option<u64>,

    /// Input node to write (overrides config)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Read device capabilities from a `getevent -pl` listing
    #[arg(long)]
    pub getevent: Option<PathBuf>,

    /// Coordinates are screen pixels on a WIDTHxHEIGHT display
    #[arg(long, value_parser = parse_screen)]
    pub screen: Option<ScreenSize>,

    /// Write a `sendevent` shell script instead of touching the device
    #[arg(long, conflicts_with = "dry_run")]
    pub script: Option<PathBuf>,

    /// Print frames as JSON lines instead of touching the device
    #[arg(long)]
    pub dry_run: bool,
}

/// Display size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn as_tuple(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Parse `1080x2400`.
pub fn parse_screen(s: &str) -> Result<ScreenSize, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let width: u32 = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
    let height: u32 = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
    if width == 0 || height == 0 {
        return Err("screen dimensions must be > 0".to_string());
    }
    Ok(ScreenSize { width, height })
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Commands {
    /// Gesture options, if this is a gesture command.
    pub fn gesture_opts(&self) -> Option<&GestureOpts> {
        match self {
            Commands::Tap { opts, .. }
            | Commands::Swipe { opts, .. }
            | Commands::LongPress { opts, .. }
            | Commands::DoubleTap { opts, .. } => Some(opts),
            Commands::Info { .. } | Commands::Config { .. } => None,
        }
    }
}
