// relayctl -- command-line driver for networked relay boards.
//
// Usage:
//   relayctl --host 192.168.1.200 toggle 0 on
//   relayctl --host 192.168.1.200 all flip
//   relayctl --host 192.168.1.200 pulse 3 1500
//   relayctl --host 192.168.1.200 version
//   relayctl discover
//   relayctl toggle 2 off                  (board found by UDP broadcast)
//
// Trigger mode, one command per line on stdin:
//   mkfifo /tmp/relay && relayctl --host 192.168.1.200 listen < /tmp/relay
//   echo "pulse 1 500" > /tmp/relay

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use relaylib_core::{RelayAction, RelayIndex};
use relaylib_waveshare::builder::DEFAULT_PORT;
use relaylib_waveshare::commands::parse_sw_version;
use relaylib_waveshare::{CommandReply, PulseEncoding, RelayBoard, RelayBoardBuilder, RelayCommand};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// relayctl -- switch relays on a networked relay board.
#[derive(Parser)]
#[command(name = "relayctl", version, about)]
struct Cli {
    /// Board IP address. Without it, the board is located by UDP broadcast
    /// before every command.
    #[arg(long)]
    host: Option<IpAddr>,

    /// Board command port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Reply timeout per command, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// How long to wait for a discovery reply, in milliseconds.
    #[arg(long, default_value_t = 3000)]
    discovery_timeout_ms: u64,

    /// Pulse duration encoding: decimal-as-hex (matches existing scripts)
    /// or binary.
    #[arg(long, default_value = "decimal-as-hex")]
    pulse_encoding: PulseEncoding,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Switch one relay: on, off or flip. Index 255 or "all" means every relay.
    Toggle { index: RelayIndex, action: RelayAction },

    /// Switch every relay.
    All { action: RelayAction },

    /// Close a relay for the given number of milliseconds (100 ms steps).
    Pulse { index: RelayIndex, on_ms: u32 },

    /// Read and print the firmware version.
    Version,

    /// Locate a board on the LAN and print its address.
    Discover,

    /// Read commands from stdin, one per line, and run each in order.
    Listen,
}

impl Command {
    fn to_relay_command(&self) -> Option<RelayCommand> {
        let command = match *self {
            Command::Toggle { index, action } => RelayCommand::Toggle { index, action },
            Command::All { action } => RelayCommand::ToggleAll { action },
            Command::Pulse { index, on_ms } => RelayCommand::Pulse { index, on_ms },
            Command::Version => RelayCommand::SwVersion,
            Command::Discover => RelayCommand::Discover,
            Command::Listen => return None,
        };
        Some(command)
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_board(cli: &Cli) -> Result<RelayBoard> {
    let mut builder = RelayBoardBuilder::new()
        .port(cli.port)
        .command_timeout(Duration::from_millis(cli.timeout_ms))
        .discovery_timeout(Duration::from_millis(cli.discovery_timeout_ms))
        .pulse_encoding(cli.pulse_encoding);
    if let Some(host) = cli.host {
        builder = builder.address(SocketAddr::new(host, cli.port));
    }
    builder.build().context("invalid board configuration")
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_reply(command: RelayCommand, reply: &CommandReply) {
    match (command, reply) {
        (RelayCommand::SwVersion, CommandReply::Frame(bytes)) => match parse_sw_version(bytes) {
            Ok(version) => println!("{}  firmware {version}", hex(bytes)),
            Err(e) => println!("{}  ({e})", hex(bytes)),
        },
        (_, CommandReply::Frame(bytes)) => println!("{}", hex(bytes)),
        (_, CommandReply::Discovered(found)) => match &found.device_id {
            Some(id) => println!("{}  {id}", found.addr.ip()),
            None => println!("{}", found.addr.ip()),
        },
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn run_one(board: &mut RelayBoard, command: RelayCommand) -> Result<()> {
    let reply = board
        .execute(command)
        .await
        .with_context(|| format!("'{command}' failed"))?;
    print_reply(command, &reply);
    Ok(())
}

/// Run commands from stdin until EOF. A failed or malformed line is
/// reported and skipped.
async fn cmd_listen(board: &mut RelayBoard) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let command: RelayCommand = match line.parse() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        if let Err(e) = run_one(board, command).await {
            eprintln!("{e:#}");
        }
    }
    tracing::debug!("stdin closed, leaving listen mode");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut board = build_board(&cli)?;
    match cli.command.to_relay_command() {
        Some(command) => run_one(&mut board, command).await,
        None => cmd_listen(&mut board).await,
    }
}
