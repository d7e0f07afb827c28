//! SCPI command/acknowledge protocol
//!
//! Every command is sent with an operation-complete query appended, so each
//! exchange is exactly one line out and one line back.
//!
//! ## Wire Format
//! ```text
//! -> <command>;*OPC?\n
//! <- 1                     # command done, no data
//! <- <payload>;1           # query data, then done
//! ```
//!
//! ## Channel Lists
//! ```text
//! ROUT:CLOS (@1,2,3)
//! CONF:VOLT 10,0.001,(@4,5)
//! ```

pub mod command;
pub mod device;
pub mod error;
pub mod response;
pub mod route;
pub mod version;

pub use command::{format_channel_clause, format_command, parse_channel_clause, Channel, Sense};
pub use device::ScpiDevice;
pub use error::{ErrorKind, ProtocolError, ProtocolResult};
pub use response::parse_acknowledgement;
pub use route::{ChannelSet, RoutePlan, RouteState};
pub use version::Version;
