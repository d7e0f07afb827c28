//! Configuration file and settings resolution

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use scpi_transport::{BaudRate, SerialConfig};
use serde::Deserialize;

/// Contents of a `scpi.toml` file
///
/// ```toml
/// port = "/dev/ttyUSB0"
/// baud = 19200
/// timeout_ms = 500
/// max_line = 2048
/// ```
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub max_line: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Default)]
pub struct Overrides {
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub timeout_ms: Option<u64>,
}

/// Merge command line over file values; the port is required
pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<SerialConfig> {
    let port = overrides
        .port
        .or(file.port)
        .ok_or_else(|| anyhow!("No serial port given (use --port or the config file)"))?;

    let baud_rate = match overrides.baud.or(file.baud) {
        Some(baud) => BaudRate::try_from(baud).map_err(|e| anyhow!(e))?,
        None => BaudRate::default(),
    };

    let mut config = SerialConfig::new(port, baud_rate);
    if let Some(ms) = overrides.timeout_ms.or(file.timeout_ms) {
        config.transport.initial_timeout = Duration::from_millis(ms);
    }
    if let Some(max_line) = file.max_line {
        config.transport.max_line = max_line;
    }

    Ok(config)
}
