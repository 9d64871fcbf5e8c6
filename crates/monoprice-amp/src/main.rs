//! # ampctl
//!
//! Command-line control for a Monoprice multi-zone amplifier on a serial port.
//!
//! # Usage
//!
//! ```bash
//! # List populated zones
//! ampctl --port /dev/ttyUSB0 zones
//!
//! # Status of every zone, or of one, as JSON
//! ampctl status
//! ampctl status 12
//!
//! # Change one attribute
//! ampctl set 11 power on
//! ampctl set 11 volume 20
//!
//! # Apply a status record saved with `status`
//! ampctl restore 11 living-room.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use monoprice_amp::{
    collect_states, open_serial, AmpConfig, AmpError, Amplifier, DEFAULT_BAUD_RATE, DEFAULT_PORT,
};
use monoprice_protocol::{Argument, Command, State, ZoneId};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Control a Monoprice multi-zone amplifier over RS-232
#[derive(Parser, Debug)]
#[command(name = "ampctl")]
#[command(version)]
#[command(about = "Control a Monoprice multi-zone amplifier over RS-232")]
struct Args {
    /// Serial device the amplifier is connected to
    #[arg(short, long, env = "AMP_PORT", default_value = DEFAULT_PORT)]
    port: String,

    /// Baud rate
    #[arg(short, long, env = "AMP_SPEED", default_value_t = DEFAULT_BAUD_RATE)]
    speed: u32,

    /// Engine settings (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Treat zones that never answer as absent during discovery
    #[arg(long)]
    silent_absent: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Discover and list populated zones
    Zones,

    /// Print zone state as JSON
    Status {
        /// Zone id (e.g. 11); all zones when omitted
        zone: Option<ZoneId>,
    },

    /// Send one command to a zone
    Set {
        zone: ZoneId,
        /// Attribute name or mnemonic (power, volume, CH, ...)
        command: Command,
        /// Value (on/off for switches, a number for levels)
        #[arg(default_value = "")]
        value: String,
    },

    /// Restore a zone from a JSON state record
    Restore { zone: ZoneId, file: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    setup_tracing(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => AmpConfig::from_yaml_file(path)?,
        None => AmpConfig::default(),
    };
    if args.silent_absent {
        config.probe_timeout_as_absent = true;
    }
    monoprice_metrics::describe_metrics();

    info!(port = %args.port, speed = args.speed, "opening serial port");
    let port = open_serial(&args.port, args.speed)?;
    let amp = Amplifier::connect(port, config).await?;
    debug!(zones = amp.zones().len(), "connected");

    let result = execute(&amp, args.command).await;
    amp.shutdown().await;
    result
}

async fn execute(amp: &Amplifier, action: Action) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        Action::Zones => {
            for zone in amp.zones() {
                println!("{}", zone.id());
            }
        }
        Action::Status { zone: Some(id) } => {
            let zone = amp.zone(id).ok_or(AmpError::InvalidZone(id))?;
            let state = zone.state().await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Action::Status { zone: None } => {
            let mut states = Vec::new();
            for (id, result) in collect_states(amp.zones()).await {
                match result {
                    Ok(state) => states.push(state),
                    Err(e) => warn!(zone = %id, "skipping zone: {}", e),
                }
            }
            println!("{}", serde_json::to_string_pretty(&states)?);
        }
        Action::Set {
            zone,
            command,
            value,
        } => {
            let argument = Argument::parse_for(command, &value)?;
            let handle = amp.zone(zone).ok_or(AmpError::InvalidZone(zone))?;
            handle.send_command(command, argument).await?;
            info!(zone = %zone, command = %command, value = %argument, "done");
        }
        Action::Restore { zone, file } => {
            let text = std::fs::read_to_string(&file)?;
            let state: State = serde_json::from_str(&text)?;
            let handle = amp.zone(zone).ok_or(AmpError::InvalidZone(zone))?;
            handle.restore(&state).await?;
        }
    }
    Ok(())
}
