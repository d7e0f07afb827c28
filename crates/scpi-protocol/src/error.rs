//! Protocol error types

use scpi_transport::TransportError;
use thiserror::Error;

use crate::route::ChannelSet;

/// Protocol-specific errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid result: {line:?}")]
    InvalidResult { line: String },

    #[error("Nonempty response for nonquery {command:?}: {payload:?}")]
    NonEmptyResponse { command: String, payload: String },

    #[error("Invalid value for {query}: {value:?}")]
    InvalidValue { query: &'static str, value: String },

    #[error("Route state desynchronized, channels possibly closed: [{maybe_closed}]: {source}")]
    RouteDesynchronized {
        maybe_closed: ChannelSet,
        source: Box<ProtocolError>,
    },
}

/// Coarse error classes reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Open, write, read or timeout on the byte stream
    Transport,
    /// Missing or malformed acknowledgement, or unexpected payload
    InvalidResult,
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Transport(_) => ErrorKind::Transport,
            ProtocolError::InvalidResult { .. }
            | ProtocolError::NonEmptyResponse { .. }
            | ProtocolError::InvalidValue { .. } => ErrorKind::InvalidResult,
            ProtocolError::RouteDesynchronized { source, .. } => source.kind(),
        }
    }

    /// Whether the cached route no longer reflects the hardware
    pub fn is_desynchronized(&self) -> bool {
        matches!(self, ProtocolError::RouteDesynchronized { .. })
    }
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
