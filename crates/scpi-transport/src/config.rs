//! Line timing configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default wait for the first byte of a response
pub const DEFAULT_INITIAL_TIMEOUT: Duration = Duration::from_millis(300);

/// Default maximum response line length in bytes
pub const DEFAULT_MAX_LINE: usize = 1024;

/// Bits on the wire per character (start + 8 data + stop)
const BITS_PER_CHAR: u64 = 10;

/// Supported serial line speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaudRate {
    #[default]
    Baud9600,
    Baud19200,
}

impl BaudRate {
    pub fn bits_per_second(self) -> u32 {
        match self {
            BaudRate::Baud9600 => 9600,
            BaudRate::Baud19200 => 19200,
        }
    }

    /// Time needed to transfer one character at this speed
    pub fn char_time(self) -> Duration {
        Duration::from_micros(BITS_PER_CHAR * 1_000_000 / u64::from(self.bits_per_second()))
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            9600 => Ok(BaudRate::Baud9600),
            19200 => Ok(BaudRate::Baud19200),
            other => Err(format!("Unsupported baud rate: {} (expected 9600 or 19200)", other)),
        }
    }
}

impl FromStr for BaudRate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| format!("Invalid baud rate: {}", s))?;
        BaudRate::try_from(value)
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits_per_second())
    }
}

/// Timing budget for reading response lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Wait for the first readiness of the stream
    pub initial_timeout: Duration,
    /// Added to the deadline for every byte received
    pub per_char_timeout: Duration,
    /// Largest accepted line, terminator included
    pub max_line: usize,
}

impl TransportConfig {
    /// Config with the per-character allowance derived from the line speed
    pub fn for_baud(baud_rate: BaudRate) -> Self {
        Self {
            initial_timeout: DEFAULT_INITIAL_TIMEOUT,
            per_char_timeout: baud_rate.char_time(),
            max_line: DEFAULT_MAX_LINE,
        }
    }

    pub fn with_initial_timeout(mut self, timeout: Duration) -> Self {
        self.initial_timeout = timeout;
        self
    }

    pub fn with_per_char_timeout(mut self, timeout: Duration) -> Self {
        self.per_char_timeout = timeout;
        self
    }

    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::for_baud(BaudRate::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_time() {
        assert_eq!(BaudRate::Baud9600.char_time(), Duration::from_micros(1041));
        assert_eq!(BaudRate::Baud19200.char_time(), Duration::from_micros(520));
    }

    #[test]
    fn test_parse_baud() {
        assert_eq!("19200".parse::<BaudRate>().unwrap(), BaudRate::Baud19200);
        assert!("115200".parse::<BaudRate>().is_err());
        assert!("fast".parse::<BaudRate>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.initial_timeout, Duration::from_millis(300));
        assert_eq!(config.per_char_timeout, Duration::from_micros(1041));
        assert_eq!(config.max_line, 1024);
    }
}
