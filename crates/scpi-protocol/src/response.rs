//! Acknowledgement parsing

use tracing::warn;

use crate::error::{ProtocolError, ProtocolResult};

/// Bare "operation complete" reply
pub const ACK_TOKEN: &str = "1";

/// Follows the payload of a query reply
pub const ACK_SUFFIX: &str = ";1";

/// Decide whether a raw line is an acknowledged reply.
///
/// Returns the query payload, empty for a bare acknowledgement.
pub fn parse_acknowledgement(line: &str) -> ProtocolResult<String> {
    let line = line.trim();

    if line == ACK_TOKEN {
        return Ok(String::new());
    }
    if let Some(payload) = line.strip_suffix(ACK_SUFFIX) {
        return Ok(payload.to_string());
    }

    warn!(line = %line, "Invalid result");
    Err(ProtocolError::InvalidResult {
        line: line.to_string(),
    })
}
