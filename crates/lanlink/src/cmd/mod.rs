use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod doctor;
pub mod run;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch and supervise a backend, printing events until Ctrl-C.
    Run(RunArgs),
    /// Launch a backend, send one operation, print the response, shut down.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Doctor(args) => doctor::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Backend executable to launch.
    pub backend: PathBuf,
    /// Directory for the per-session socket paths.
    #[arg(long, value_name = "DIR")]
    pub pipe_dir: Option<PathBuf>,
    /// How long to wait for the backend to dial in (e.g. 5s, 500ms).
    #[arg(long, default_value = "15s")]
    pub connect_timeout: String,
    /// Extra arguments passed to the backend, before the channel arguments.
    #[arg(last = true)]
    pub backend_args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Backend executable to launch.
    pub backend: PathBuf,
    /// Operation to send (e.g. ConnectToDevice, ModifySettings).
    #[arg(long, short = 'o')]
    pub operation: String,
    /// JSON request body.
    #[arg(long)]
    pub data: Option<String>,
    /// Response timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "30s")]
    pub timeout: String,
    /// How long to wait for the backend to become ready.
    #[arg(long, default_value = "15s")]
    pub ready_timeout: String,
    /// Directory for the per-session socket paths.
    #[arg(long, value_name = "DIR")]
    pub pipe_dir: Option<PathBuf>,
    /// How long to wait for the backend to dial in (e.g. 5s, 500ms).
    #[arg(long, default_value = "15s")]
    pub connect_timeout: String,
    /// Extra arguments passed to the backend, before the channel arguments.
    #[arg(last = true)]
    pub backend_args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    /// Backend executable to check.
    #[arg(long)]
    pub backend: Option<PathBuf>,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<std::time::Duration> {
    use crate::exit::{CliError, USAGE};

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
        "ms" => Ok(std::time::Duration::from_millis(value)),
        "s" => Ok(std::time::Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
