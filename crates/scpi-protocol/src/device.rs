//! Instrument handle
//!
//! All traffic goes through [`ScpiDevice::send_query`]: the command is framed
//! with the acknowledgement request, written, and exactly one reply line is
//! read back. Every method takes `&mut self`, so only one request can be in
//! flight per connection.
//!
//! # Cancel Safety
//! None of the methods are cancel safe. Dropping a future after the write but
//! before the reply leaves the reply in the stream, where it would be taken as
//! the acknowledgement of the next command.

use std::time::Duration;

use scpi_transport::{LineTransport, TransportError};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::command::{format_command, frame, Channel, Sense, LINE_TERMINATOR};
use crate::error::{ProtocolError, ProtocolResult};
use crate::response::parse_acknowledgement;
use crate::route::{ChannelSet, RouteState};
use crate::version::Version;

/// `*RST` can take a while on relay scanners
const RESET_TIMEOUT: Duration = Duration::from_millis(500);

/// Triggering a measurement or scan
const TRIGGER_TIMEOUT: Duration = Duration::from_secs(2);

const ROUTE_OPEN: &str = "ROUT:OPEN";
const ROUTE_CLOSE: &str = "ROUT:CLOS";
const ROUTE_SCAN: &str = "ROUT:SCAN";

/// A SCPI instrument on a line-oriented byte stream
pub struct ScpiDevice<S> {
    transport: Option<LineTransport<S>>,
    route: RouteState,
}

impl<S> ScpiDevice<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// A handle with no connection
    pub fn new() -> Self {
        Self {
            transport: None,
            route: RouteState::unknown(),
        }
    }

    /// Wrap an already initialised connection without resetting the instrument.
    ///
    /// The route state starts unknown.
    pub fn attach(transport: LineTransport<S>) -> Self {
        Self {
            transport: Some(transport),
            route: RouteState::unknown(),
        }
    }

    /// Take over `transport`, reset the instrument and switch it to remote mode.
    ///
    /// Any previous connection is closed first. On failure the new connection
    /// is closed as well.
    pub async fn open(&mut self, transport: LineTransport<S>) -> ProtocolResult<()> {
        self.close();
        self.transport = Some(transport);

        if let Err(e) = self.handshake().await {
            warn!(error = %e, "Instrument handshake failed");
            self.close();
            return Err(e);
        }

        // *RST opens every relay
        self.route = RouteState::all_open();
        info!("Instrument ready");
        Ok(())
    }

    async fn handshake(&mut self) -> ProtocolResult<()> {
        // flush whatever partial command the instrument may be holding
        self.transport_mut()?.write_str(LINE_TERMINATOR).await?;
        self.send_cmd("*RST;*CLS", Some(RESET_TIMEOUT)).await?;
        self.system_remote().await
    }

    /// Drop the connection. The route state becomes unknown.
    pub fn close(&mut self) {
        self.route.reset();
        if self.transport.take().is_some() {
            info!("Instrument connection closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// The cached route
    pub fn route(&self) -> &RouteState {
        &self.route
    }

    fn transport_mut(&mut self) -> ProtocolResult<&mut LineTransport<S>> {
        self.transport
            .as_mut()
            .ok_or(ProtocolError::Transport(TransportError::NotOpen))
    }

    /// Send `cmd` with the acknowledgement request and return the reply payload.
    ///
    /// `timeout` overrides the transport's initial read timeout.
    pub async fn send_query(
        &mut self,
        cmd: &str,
        timeout: Option<Duration>,
    ) -> ProtocolResult<String> {
        let framed = frame(cmd);
        debug!(command = %cmd, "Sending");

        self.transport_mut()?.write_str(&framed).await?;
        self.recv_response(timeout).await
    }

    /// Read one reply line and check its acknowledgement
    pub async fn recv_response(&mut self, timeout: Option<Duration>) -> ProtocolResult<String> {
        let line = self.transport_mut()?.read_line(timeout).await?;
        parse_acknowledgement(&line)
    }

    /// Send a command that must not return data
    pub async fn send_cmd(&mut self, cmd: &str, timeout: Option<Duration>) -> ProtocolResult<()> {
        let payload = self.send_query(cmd, timeout).await?;

        if !payload.is_empty() {
            warn!(command = %cmd, payload = %payload, "Nonempty response for nonquery");
            return Err(ProtocolError::NonEmptyResponse {
                command: cmd.to_string(),
                payload,
            });
        }
        Ok(())
    }

    /// Send `cmd (@channels)`, or plain `cmd` for no channels
    pub async fn send_cmd_channels(
        &mut self,
        cmd: &str,
        channels: &[Channel],
        timeout: Option<Duration>,
    ) -> ProtocolResult<()> {
        self.send_cmd(&format_command(cmd, &[], channels), timeout).await
    }

    /// Send `cmd params,...,(@channels)`
    pub async fn send_cmd_params(
        &mut self,
        cmd: &str,
        params: &[&str],
        channels: &[Channel],
        timeout: Option<Duration>,
    ) -> ProtocolResult<()> {
        self.send_cmd(&format_command(cmd, params, channels), timeout).await
    }

    /// Close exactly `channels`, opening every other channel the driver closed.
    ///
    /// Opens are issued before closes. If any command fails the route state
    /// becomes unknown and [`ProtocolError::RouteDesynchronized`] is returned;
    /// nothing is rolled back. The next call re-closes every requested channel.
    /// Channels are only suspected closed once their close command was sent.
    pub async fn set_route(&mut self, channels: impl Into<ChannelSet>) -> ProtocolResult<()> {
        self.transport_mut()?;

        let requested = channels.into();
        let plan = self.route.diff(&requested);
        if plan.is_empty() {
            return Ok(());
        }

        debug!(open = %plan.open, close = %plan.close, "Changing route");
        if !plan.open.is_empty() {
            let opened = self.send_cmd_channels(ROUTE_OPEN, plan.open.as_slice(), None).await;
            if let Err(e) = opened {
                return Err(self.desynchronized(&ChannelSet::new(), e));
            }
        }
        if !plan.close.is_empty() {
            let closed = self.send_cmd_channels(ROUTE_CLOSE, plan.close.as_slice(), None).await;
            if let Err(e) = closed {
                return Err(self.desynchronized(&plan.close, e));
            }
        }

        self.route.confirm(requested);
        Ok(())
    }

    fn desynchronized(&mut self, attempted_close: &ChannelSet, e: ProtocolError) -> ProtocolError {
        self.route.desynchronize(attempted_close);
        let maybe_closed = self.route.maybe_closed().clone();
        warn!(error = %e, maybe_closed = %maybe_closed, "Route desynchronized");
        ProtocolError::RouteDesynchronized {
            maybe_closed,
            source: Box::new(e),
        }
    }

    /// Set the scan list and start it
    pub async fn set_scan(&mut self, channels: &[Channel]) -> ProtocolResult<()> {
        let cmd = format!("{};:INIT", format_command(ROUTE_SCAN, &[], channels));
        self.send_cmd(&cmd, Some(TRIGGER_TIMEOUT)).await
    }

    /// Select the measurement function, with optional range/resolution params
    pub async fn set_sense(
        &mut self,
        sense: Sense,
        channels: &[Channel],
        params: &[&str],
    ) -> ProtocolResult<()> {
        self.send_cmd_params(sense.command(), params, channels, None).await
    }

    /// Trigger and fetch readings
    pub async fn read(&mut self, timeout: Option<Duration>) -> ProtocolResult<Vec<String>> {
        let payload = self.send_query("READ?", timeout).await?;

        Ok(payload
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn init(&mut self) -> ProtocolResult<()> {
        self.send_cmd("INIT", Some(TRIGGER_TIMEOUT)).await
    }

    pub async fn idn(&mut self) -> ProtocolResult<String> {
        self.send_query("*IDN?", None).await
    }

    pub async fn reset(&mut self) -> ProtocolResult<()> {
        self.send_cmd("*RST", Some(RESET_TIMEOUT)).await?;
        self.route = RouteState::all_open();
        Ok(())
    }

    pub async fn system_remote(&mut self) -> ProtocolResult<()> {
        self.send_cmd("SYST:REM", None).await
    }

    /// SCPI version; a malformed reply gives [`Version::INVALID`]
    pub async fn system_version(&mut self) -> ProtocolResult<Version> {
        let payload = self.send_query("SYST:VERS?", None).await?;
        Ok(Version::parse_lossy(&payload))
    }

    /// Source current setpoint in amperes
    pub async fn current(&mut self) -> ProtocolResult<f64> {
        const QUERY: &str = "SOUR:CURR?";

        let payload = self.send_query(QUERY, None).await?;
        payload
            .trim()
            .parse()
            .map_err(|_| ProtocolError::InvalidValue {
                query: QUERY,
                value: payload,
            })
    }

    pub async fn set_current(&mut self, amperes: f64) -> ProtocolResult<()> {
        self.send_cmd(&format!("SOUR:CURR {}", amperes), None).await
    }

    pub async fn output(&mut self) -> ProtocolResult<bool> {
        const QUERY: &str = "OUTP?";

        let payload = self.send_query(QUERY, None).await?;
        match payload.as_str() {
            "1" => Ok(true),
            "0" => Ok(false),
            _ => Err(ProtocolError::InvalidValue {
                query: QUERY,
                value: payload,
            }),
        }
    }

    pub async fn set_output(&mut self, enabled: bool) -> ProtocolResult<()> {
        let cmd = if enabled { "OUTP 1" } else { "OUTP 0" };
        self.send_cmd(cmd, None).await
    }
}

impl<S> Default for ScpiDevice<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "serial")]
impl ScpiDevice<scpi_transport::SerialStream> {
    /// Open the serial port described by `config` and initialise the instrument
    pub async fn open_serial(
        &mut self,
        config: &scpi_transport::SerialConfig,
    ) -> ProtocolResult<()> {
        self.close();
        let transport = scpi_transport::open_serial(config)?;
        self.open(transport).await
    }
}
