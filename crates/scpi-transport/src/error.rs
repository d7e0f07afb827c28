//! Transport error types

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Transport-level errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[cfg(feature = "serial")]
    #[error("Failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[cfg(feature = "serial")]
    #[error("Failed to list serial ports: {0}")]
    ListPorts(#[source] tokio_serial::Error),

    #[error("Connection is not open")]
    NotOpen,

    #[error("Write failed: {0}")]
    Write(#[source] io::Error),

    #[error("Read failed: {0}")]
    Read(#[source] io::Error),

    #[error("Timed out after {waited:?} waiting for response line")]
    Timeout { waited: Duration },

    #[error("Stream closed by peer")]
    Closed,

    #[error("Line exceeds {max} bytes without terminator")]
    LineTooLong { max: usize },
}

impl TransportError {
    /// Whether the error is a read deadline expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
