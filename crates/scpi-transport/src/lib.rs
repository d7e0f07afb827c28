//! SCPI Transport Layer
//!
//! Turns a character-at-a-time byte stream into complete response lines:
//! - Line: adaptive-timeout line reader over any async byte stream
//! - Serial: opening and enumerating serial ports (optional feature)
//!
//! ## Read deadline
//! ```text
//! deadline = start + initial_timeout
//! deadline += per_char_timeout * bytes_just_read   (after every read)
//! ```

pub mod config;
pub mod error;
pub mod line;
#[cfg(feature = "serial")]
pub mod serial;

pub use config::{BaudRate, TransportConfig};
pub use error::{TransportError, TransportResult};
pub use line::LineTransport;
#[cfg(feature = "serial")]
pub use serial::{list_ports, open_serial, SerialConfig, SerialStream};
