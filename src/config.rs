use clap::{Parser, ValueEnum};
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_WIDTH: u32 = 300;
pub const DEFAULT_HEIGHT: u32 = 150;
pub const DEFAULT_INTERVAL_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Facing {
    #[default]
    User,
    Environment,
}

#[derive(Debug, Parser)]
#[command(name = "qrcam", version, about = "Scan QR codes from a live camera feed")]
pub struct Args {
    /// V4L2 device index (/dev/videoN)
    #[arg(short, long, default_value_t = 0)]
    pub device: usize,

    /// Requested frame width, also the decode buffer width
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    pub width: u32,

    /// Requested frame height, also the decode buffer height
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    pub height: u32,

    /// Delay between scan attempts in milliseconds
    #[arg(long, default_value_t = DEFAULT_INTERVAL_MS)]
    pub interval_ms: u64,

    /// Preferred camera facing
    #[arg(long, value_enum, default_value_t = Facing::User)]
    pub facing: Facing,

    /// Drive the scanner from the terminal instead of a layer-shell window
    #[arg(long)]
    pub headless: bool,

    /// Write the annotated snapshot to this PNG after each detection
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

/// What the frame source is asked for when a stream is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    pub width: u32,
    pub height: u32,
    pub audio: bool,
    pub facing: Facing,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            audio: false,
            facing: Facing::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub constraints: Constraints,
    pub interval: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            constraints: Constraints::default(),
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
        }
    }
}

impl From<&Args> for ScanConfig {
    fn from(args: &Args) -> Self {
        Self {
            constraints: Constraints {
                width: args.width,
                height: args.height,
                audio: false,
                facing: args.facing,
            },
            interval: Duration::from_millis(args.interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_scan_parameters() {
        let args = Args::parse_from(["qrcam"]);
        let config = ScanConfig::from(&args);
        assert_eq!(config, ScanConfig::default());
        assert_eq!(config.constraints.width, 300);
        assert_eq!(config.constraints.height, 150);
        assert!(!config.constraints.audio);
        assert_eq!(config.interval, Duration::from_millis(300));
    }

    #[test]
    fn overrides_are_applied() {
        let args = Args::parse_from([
            "qrcam",
            "--device",
            "2",
            "--width",
            "640",
            "--height",
            "480",
            "--interval-ms",
            "100",
            "--facing",
            "environment",
            "--headless",
        ]);
        assert_eq!(args.device, 2);
        assert!(args.headless);
        let config = ScanConfig::from(&args);
        assert_eq!(config.constraints.width, 640);
        assert_eq!(config.constraints.facing, Facing::Environment);
        assert_eq!(config.interval, Duration::from_millis(100));
    }
}
