//! Configuration file handling for sketchrun.
//!
//! Settings are read from `--config <path>`, else `sketchrun.toml` in the
//! current directory, else `~/.config/sketchrun/config.toml`. A missing file
//! means built-in defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::backend::DEFAULT_PROGRAM;

/// Name of the per-project config file looked up in the current directory.
pub const PROJECT_FILE: &str = "sketchrun.toml";

pub const DEFAULT_FQBN: &str = "esp32:esp32:esp32";
pub const DEFAULT_UPLOAD_SPEED: u32 = 115_200;
pub const DEFAULT_BAUDRATE: u32 = 115_200;

/// Configuration file structure for sketchrun.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub arduino: ArduinoConfig,
}

/// The `[arduino]` table.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ArduinoConfig {
    pub fqbn: String,
    pub upload_speed: u32,
    pub baudrate: u32,
    pub sketch_path: PathBuf,
    /// Backend binary to drive
    pub cli: String,
}

impl Default for ArduinoConfig {
    fn default() -> Self {
        Self {
            fqbn: DEFAULT_FQBN.to_string(),
            upload_speed: DEFAULT_UPLOAD_SPEED,
            baudrate: DEFAULT_BAUDRATE,
            sketch_path: PathBuf::from("."),
            cli: DEFAULT_PROGRAM.to_string(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one the project file and then the
    /// user config file are tried, falling back to defaults when neither
    /// exists. Returns an error if a file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            return Self::load_file(path);
        }

        match discover_path() {
            Some(path) => Self::load_file(&path),
            None => Ok(Config::default()),
        }
    }

    /// Parse a config file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        log::debug!("loaded config from {}", path.display());
        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// FQBN: CLI flag or config.
    pub fn fqbn(&self, flag: Option<&str>) -> String {
        flag
            .map(str::to_string)
            .unwrap_or_else(|| self.arduino.fqbn.clone())
    }

    /// Upload speed in baud: CLI flag or config.
    pub fn upload_speed(&self, flag: Option<u32>) -> u32 {
        flag.unwrap_or(self.arduino.upload_speed)
    }

    /// Monitor baud rate: CLI flag or config.
    pub fn baudrate(&self, flag: Option<u32>) -> u32 {
        flag.unwrap_or(self.arduino.baudrate)
    }

    /// Sketch directory: CLI flag or config.
    pub fn sketch_path(&self, flag: Option<&Path>) -> PathBuf {
        flag
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.arduino.sketch_path.clone())
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file '{}' does not exist", .path.display())]
    NotFound { path: PathBuf },

    #[error("Config file already exists: {}\nUse 'sketchrun config show' to view current settings.", .path.display())]
    AlreadyExists { path: PathBuf },

    #[error("Failed to read config file '{}': {source}", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// First existing config file: the project file, then the user file.
pub fn discover_path() -> Option<PathBuf> {
    let project = PathBuf::from(PROJECT_FILE);
    if project.exists() {
        return Some(project);
    }
    let user = default_path();
    user.exists().then_some(user)
}

/// Get the default (user-level) config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("sketchrun").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/sketchrun/config.toml")
        })
}

/// Commented template written by `config init`.
pub const DEFAULT_CONFIG: &str = r#"# sketchrun configuration

[arduino]
# Fully qualified board name passed to --fqbn
fqbn = "esp32:esp32:esp32"
# Upload speed in baud (appended to the FQBN as UploadSpeed=...)
upload_speed = 115200
# Serial monitor baud rate
baudrate = 115200
# Sketch directory
sketch_path = "."
# Backend binary
cli = "arduino-cli"
"#;
