//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Simplified wrapper around arduino-cli with serial port auto-detection
#[derive(Parser, Debug)]
#[command(name = "sketchrun")]
#[command(version, about = "Compile, upload and monitor Arduino sketches", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile the sketch
    Compile {
        /// Board FQBN (e.g. esp32:esp32:esp32)
        #[arg(long)]
        fqbn: Option<String>,

        /// Sketch path
        #[arg(long, short)]
        path: Option<PathBuf>,
    },
    /// Upload the sketch to a board
    Upload {
        /// Board FQBN
        #[arg(long)]
        fqbn: Option<String>,

        /// Serial port (auto-detected if omitted)
        #[arg(long)]
        port: Option<String>,

        /// Upload speed in baud
        #[arg(long)]
        speed: Option<u32>,

        /// Sketch path
        #[arg(long, short)]
        path: Option<PathBuf>,
    },
    /// Open the serial monitor
    Monitor {
        /// Serial port (auto-detected if omitted)
        #[arg(long)]
        port: Option<String>,

        /// Baud rate
        #[arg(long)]
        baudrate: Option<u32>,
    },
    /// Compile, upload, then monitor (in sequence)
    Run {
        /// Board FQBN
        #[arg(long)]
        fqbn: Option<String>,

        /// Serial port (auto-detected if omitted)
        #[arg(long)]
        port: Option<String>,

        /// Upload speed in baud
        #[arg(long)]
        speed: Option<u32>,

        /// Monitor baud rate
        #[arg(long)]
        baudrate: Option<u32>,

        /// Sketch path
        #[arg(long, short)]
        path: Option<PathBuf>,
    },
    /// Show information about boards, libraries, cores and config
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
    /// Show the arduino-cli version
    Version,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowTarget {
    /// Connected USB boards
    Boards,
    /// Installed libraries
    Libraries,
    /// Installed cores/platforms
    Cores,
    /// Effective tool configuration
    Config,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_defaults() {
        let args = Args::parse_from(["sketchrun", "compile"]);
        assert!(args.config.is_none());
        assert!(!args.verbose);
        match args.command {
            Command::Compile { fqbn, path } => {
                assert!(fqbn.is_none());
                assert!(path.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_upload_flags() {
        let args = Args::parse_from([
            "sketchrun",
            "upload",
            "--fqbn",
            "arduino:avr:uno",
            "--port",
            "/dev/ttyACM0",
            "--speed",
            "57600",
            "-p",
            "blink",
        ]);
        match args.command {
            Command::Upload {
                fqbn,
                port,
                speed,
                path,
            } => {
                assert_eq!(fqbn.as_deref(), Some("arduino:avr:uno"));
                assert_eq!(port.as_deref(), Some("/dev/ttyACM0"));
                assert_eq!(speed, Some(57600));
                assert_eq!(path, Some(PathBuf::from("blink")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_monitor_baudrate() {
        let args = Args::parse_from(["sketchrun", "monitor", "--baudrate", "9600"]);
        match args.command {
            Command::Monitor { port, baudrate } => {
                assert!(port.is_none());
                assert_eq!(baudrate, Some(9600));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_show_targets() {
        let args = Args::parse_from(["sketchrun", "show", "boards"]);
        assert!(matches!(
            args.command,
            Command::Show {
                what: ShowTarget::Boards
            }
        ));
        let args = Args::parse_from(["sketchrun", "show", "libraries"]);
        assert!(matches!(
            args.command,
            Command::Show {
                what: ShowTarget::Libraries
            }
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["sketchrun", "version", "--config", "my.toml", "-v"]);
        assert_eq!(args.config, Some(PathBuf::from("my.toml")));
        assert!(args.verbose);
        assert!(matches!(args.command, Command::Version));
    }

    #[test]
    fn test_invalid_speed_rejected() {
        assert!(Args::try_parse_from(["sketchrun", "upload", "--speed", "fast"]).is_err());
    }
}
