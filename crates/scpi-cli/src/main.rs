//! SCPI CLI Client
//!
//! Interactive command-line client for serial SCPI instruments.
//!
//! # Usage
//!
//! ```bash
//! # List serial ports
//! scpi --list
//!
//! # Interactive session
//! scpi --port /dev/ttyUSB0 --baud 19200
//!
//! # Execute single command
//! scpi --port /dev/ttyUSB0 -c "MEAS:VOLT?"
//!
//! # With configuration file
//! scpi --config ~/.config/scpi.toml
//! ```

mod config;
mod shell;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use scpi_protocol::ScpiDevice;
use scpi_transport::SerialStream;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::{resolve, FileConfig, Overrides};
use crate::shell::{execute, parse_action, Action};

const DESYNC_HINT: &str = "Route state unknown; the next route re-closes every requested channel.";

/// SCPI Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "scpi")]
#[command(author, version, about = "SCPI CLI - serial instrument client")]
struct Args {
    /// Serial port device
    #[arg(short, long, env = "SCPI_PORT")]
    port: Option<String>,

    /// Baud rate (9600 or 19200)
    #[arg(short, long, env = "SCPI_BAUD")]
    baud: Option<u32>,

    /// Initial response timeout in milliseconds
    #[arg(short, long, env = "SCPI_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Configuration file path
    #[arg(long, env = "SCPI_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SCPI_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Execute command and exit
    #[arg(short, long)]
    command: Option<String>,

    /// List serial ports and exit
    #[arg(short, long)]
    list: bool,

    /// Skip the reset/remote handshake on connect
    #[arg(long)]
    no_init: bool,

    /// Quiet mode (no banner)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    if args.list {
        for port in scpi_transport::list_ports()? {
            println!("{}", port);
        }
        return Ok(());
    }

    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let overrides = Overrides {
        port: args.port.clone(),
        baud: args.baud,
        timeout_ms: args.timeout_ms,
    };
    let serial = resolve(overrides, file)?;
    debug!(?serial, "Resolved settings");

    // Connect
    let mut device = if args.no_init {
        ScpiDevice::attach(scpi_transport::open_serial(&serial)?)
    } else {
        let mut device: ScpiDevice<SerialStream> = ScpiDevice::new();
        device
            .open_serial(&serial)
            .await
            .with_context(|| format!("Failed to initialise instrument on {}", serial.port))?;
        device
    };

    // Single command mode
    if let Some(cmd) = args.command {
        let action = parse_action(&cmd).map_err(anyhow::Error::msg)?;
        if let Some(output) = execute(&mut device, &action).await? {
            println!("{}", output);
        }
        return Ok(());
    }

    if !args.quiet {
        println!(
            "{}",
            format!(
                "Connected to {} at {} baud\nType 'help' for commands, 'quit' to exit",
                serial.port, serial.baud_rate
            )
            .cyan()
        );
    }

    // Interactive mode
    let mut rl = DefaultEditor::new()?;
    let history_path = home_dir()
        .map(|p| p.join(".scpi_history"))
        .unwrap_or_default();

    let _ = rl.load_history(&history_path);

    loop {
        let prompt = format!("{}> ", "scpi".green());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                let action = match parse_action(line) {
                    Ok(action) => action,
                    Err(e) => {
                        eprintln!("{} {}", "Error:".red(), e);
                        continue;
                    }
                };

                match action {
                    Action::Quit => break,
                    Action::Help => {
                        print_help();
                        continue;
                    }
                    Action::Clear => {
                        print!("\x1B[2J\x1B[1;1H");
                        continue;
                    }
                    _ => {}
                }

                match execute(&mut device, &action).await {
                    Ok(Some(output)) => println!("{}", output.green()),
                    Ok(None) => {}
                    Err(e) => {
                        eprintln!("{} {}", "Error:".red(), e);
                        if e.is_desynchronized() {
                            eprintln!("{}", DESYNC_HINT.yellow());
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    device.close();
    Ok(())
}

fn init_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn print_help() {
    println!(
        r#"
{}

{}
  route <c1,c2,...>                      Close exactly these channels
  route                                  Open every channel
  scan <c1,c2,...>                       Set scan list and start
  read                                   Trigger and fetch readings
  idn                                    Instrument identification
  version                                SCPI version
  reset                                  Reset the instrument

{}
  <anything else>                        Sent as-is, reply printed

{}
  help                                   Show this help
  clear                                  Clear screen
  quit/exit                              Exit CLI
"#,
        "SCPI Commands".cyan().bold(),
        "Instrument".yellow().bold(),
        "Raw".yellow().bold(),
        "Local".yellow().bold(),
    );
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
