//! Serial port transport

pub use tokio_serial::SerialStream;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};
use tracing::{debug, info};

use crate::config::{BaudRate, TransportConfig};
use crate::error::{TransportError, TransportResult};
use crate::line::LineTransport;

/// Serial line settings for an instrument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`
    pub port: String,
    pub baud_rate: BaudRate,
    pub transport: TransportConfig,
}

impl SerialConfig {
    /// Settings with line timing derived from the baud rate
    pub fn new(port: impl Into<String>, baud_rate: BaudRate) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            transport: TransportConfig::for_baud(baud_rate),
        }
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}

/// Open the port 8N1 without flow control.
///
/// Must be called from within a tokio runtime.
pub fn open_serial(config: &SerialConfig) -> TransportResult<LineTransport<SerialStream>> {
    let stream = tokio_serial::new(&config.port, config.baud_rate.bits_per_second())
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|source| TransportError::Open {
            port: config.port.clone(),
            source,
        })?;

    info!(port = %config.port, baud = %config.baud_rate, "Serial port opened");
    Ok(LineTransport::new(stream, config.transport.clone()))
}

/// Names of the serial ports present on this machine, sorted
pub fn list_ports() -> TransportResult<Vec<String>> {
    let mut ports: Vec<String> = tokio_serial::available_ports()
        .map_err(TransportError::ListPorts)?
        .into_iter()
        .map(|info| info.port_name)
        .collect();
    ports.sort();

    debug!(count = ports.len(), "Enumerated serial ports");
    Ok(ports)
}
