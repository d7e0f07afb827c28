//! Interactive command handling

use scpi_protocol::{ChannelSet, ProtocolResult, ScpiDevice};
use tokio::io::{AsyncRead, AsyncWrite};

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Close exactly these channels
    Route(ChannelSet),
    /// Scan these channels
    Scan(ChannelSet),
    Read,
    Idn,
    Version,
    Reset,
    /// Anything else goes to the instrument verbatim
    Raw(String),
    Help,
    Clear,
    Quit,
}

pub fn parse_action(line: &str) -> Result<Action, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let action = match word.to_lowercase().as_str() {
        "route" => Action::Route(rest.parse()?),
        "scan" => {
            let channels: ChannelSet = rest.parse()?;
            if channels.is_empty() {
                return Err("scan needs at least one channel".into());
            }
            Action::Scan(channels)
        }
        "read" if rest.is_empty() => Action::Read,
        "idn" if rest.is_empty() => Action::Idn,
        "version" if rest.is_empty() => Action::Version,
        "reset" if rest.is_empty() => Action::Reset,
        "help" => Action::Help,
        "clear" => Action::Clear,
        "quit" | "exit" => Action::Quit,
        _ => Action::Raw(line.to_string()),
    };
    Ok(action)
}

/// Run an instrument action and describe the result.
///
/// Local actions (help, clear, quit) produce nothing.
pub async fn execute<S>(
    device: &mut ScpiDevice<S>,
    action: &Action,
) -> ProtocolResult<Option<String>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let output = match action {
        Action::Route(channels) => {
            device.set_route(channels.clone()).await?;
            format!("closed: [{}]", channels)
        }
        Action::Scan(channels) => {
            device.set_scan(channels.as_slice()).await?;
            format!("scanning: [{}]", channels)
        }
        Action::Read => device.read(None).await?.join("\n"),
        Action::Idn => device.idn().await?,
        Action::Version => {
            let version = device.system_version().await?;
            if version.is_valid() {
                version.to_string()
            } else {
                "(invalid version)".to_string()
            }
        }
        Action::Reset => {
            device.reset().await?;
            "OK".to_string()
        }
        Action::Raw(cmd) => {
            let payload = device.send_query(cmd, None).await?;
            if payload.is_empty() {
                "OK".to_string()
            } else {
                payload
            }
        }
        Action::Help | Action::Clear | Action::Quit => return Ok(None),
    };
    Ok(Some(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scpi_transport::{LineTransport, TransportConfig};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_parse_shortcuts() {
        assert_eq!(
            parse_action("route 1, 2,3").unwrap(),
            Action::Route(ChannelSet::from([1, 2, 3]))
        );
        assert_eq!(parse_action("ROUTE").unwrap(), Action::Route(ChannelSet::new()));
        assert_eq!(
            parse_action("scan 101,102").unwrap(),
            Action::Scan(ChannelSet::from([101, 102]))
        );
        assert_eq!(parse_action(" read ").unwrap(), Action::Read);
        assert_eq!(parse_action("idn").unwrap(), Action::Idn);
        assert_eq!(parse_action("exit").unwrap(), Action::Quit);
    }

    #[test]
    fn test_parse_raw() {
        assert_eq!(
            parse_action("MEAS:VOLT:DC? (@101)").unwrap(),
            Action::Raw("MEAS:VOLT:DC? (@101)".into())
        );
        assert_eq!(parse_action("read extra").unwrap(), Action::Raw("read extra".into()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_action("route 1,x").is_err());
        assert!(parse_action("scan").is_err());
    }

    #[tokio::test]
    async fn test_execute_raw_query() {
        let (client, mut server) = duplex(256);
        let mut device = ScpiDevice::attach(LineTransport::new(client, TransportConfig::default()));
        server.write_all(b"+2.25E+00;1\n").await.unwrap();

        let output = execute(&mut device, &Action::Raw("MEAS:VOLT?".into())).await.unwrap();
        assert_eq!(output.as_deref(), Some("+2.25E+00"));

        let mut sent = [0u8; 17];
        server.read_exact(&mut sent).await.unwrap();
        assert_eq!(&sent, b"MEAS:VOLT?;*OPC?\n");
    }

    #[tokio::test]
    async fn test_execute_local_action() {
        let mut device: ScpiDevice<tokio::io::DuplexStream> = ScpiDevice::new();
        assert_eq!(execute(&mut device, &Action::Help).await.unwrap(), None);
    }
}
