//! Command framing and channel-list formatting

use std::fmt::Write;

/// Addressable instrument channel (relay or measurement point)
pub type Channel = u32;

/// Operation-complete query appended to every command
pub const ACK_REQUEST: &str = ";*OPC?";

/// Terminates every outgoing command
pub const LINE_TERMINATOR: &str = "\n";

/// Measurement function selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Voltage,
    Resistance,
    Temperature,
}

const SENSE_COMMANDS: [&str; 3] = ["CONF:VOLT", "CONF:RES", "CONF:TEMP"];

impl Sense {
    pub fn command(self) -> &'static str {
        SENSE_COMMANDS[self as usize]
    }
}

/// `(@c1,c2,...)`, or an empty string for no channels. Input order is kept.
pub fn format_channel_clause(channels: &[Channel]) -> String {
    if channels.is_empty() {
        return String::new();
    }

    let mut clause = String::from("(@");
    for (i, channel) in channels.iter().enumerate() {
        if i > 0 {
            clause.push(',');
        }
        let _ = write!(clause, "{}", channel);
    }
    clause.push(')');
    clause
}

/// Parse a `(@c1,c2,...)` clause back into its channels
pub fn parse_channel_clause(clause: &str) -> Option<Vec<Channel>> {
    let inner = clause.trim().strip_prefix("(@")?.strip_suffix(')')?;
    inner
        .split(',')
        .map(|channel| channel.parse::<Channel>().ok())
        .collect()
}

/// Build `<cmd> <param1,param2,...,(@c1,c2,...)>`.
///
/// Parameters come before the channel clause; with neither the command text
/// is returned unchanged.
pub fn format_command(cmd: &str, params: &[&str], channels: &[Channel]) -> String {
    if params.is_empty() && channels.is_empty() {
        return cmd.to_string();
    }

    let mut args: Vec<String> = params.iter().map(|p| p.to_string()).collect();
    if !channels.is_empty() {
        args.push(format_channel_clause(channels));
    }

    format!("{} {}", cmd, args.join(","))
}

/// Append the acknowledgement request and line terminator
pub fn frame(cmd: &str) -> String {
    format!("{}{}{}", cmd, ACK_REQUEST, LINE_TERMINATOR)
}
