use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod client;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Listen on a service and print every message received.
    Serve(ServeArgs),
    /// Run the doTests sequence against a server.
    Client(ClientArgs),
    /// Send a single typed message.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Client(args) => client::run(args),
        Command::Send(args) => send::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port number or service name to listen on (0 picks a free port).
    pub service: String,
    /// Exit after serving N connections to completion.
    #[arg(long)]
    pub count: Option<usize>,
    /// Report peers numerically instead of resolving their names.
    #[arg(long)]
    pub numeric: bool,
    /// Consecutive empty reads before a silent peer is dropped.
    #[arg(long, value_name = "N")]
    pub stall_limit: Option<u32>,
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Server address as "host port".
    pub address: String,
    /// Keep the connection open this long after sending (e.g. 10s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub linger: Option<String>,
    /// Connect timeout per resolved address (e.g. 5s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub connect_timeout: Option<String>,
}

#[derive(Args, Debug)]
#[command(group(
    clap::ArgGroup::new("payload")
        .required(true)
        .args(["text", "ints", "doubles", "file"])
))]
pub struct SendArgs {
    /// Server address as "host port".
    pub address: String,
    /// Text payload (char message).
    #[arg(long)]
    pub text: Option<String>,
    /// Comma-separated 32-bit integers.
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub ints: Option<Vec<i32>>,
    /// Comma-separated 64-bit floats.
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub doubles: Option<Vec<f64>>,
    /// Read a raw payload from file.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
