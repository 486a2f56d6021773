mod commands;
mod helpers;

use clap::Parser;
use mapdl_core::domain::SessionError;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let session_error = error.as_session_error();
            eprintln!("{}", session_error.diagnostic_line());
            session_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("mapdl-session".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    match Cli::try_parse_from(&full_args) {
        Ok(cli) => {
            init_tracing(cli.log_level.as_deref());
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "mapdl-session",
    about = "Drive one long-lived analysis engine session over many cases"
)]
struct Cli {
    /// Log filter, e.g. `debug` or `mapdl_core=trace` (defaults to RUST_LOG, then `info`)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Generate the control script for a session without launching the engine
    Script(commands::ScriptArgs),
    /// Run the selected cases through one engine session
    Run(commands::RunArgs),
    /// Show the cached results of one case
    Cache(commands::CacheArgs),
    /// Show the handshake signal names of a session and how to stop it by hand
    Signals(commands::SignalsArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Script(args) => commands::run_script_command(args),
        CliCommand::Run(args) => commands::run_run_command(args),
        CliCommand::Cache(args) => commands::run_cache_command(args),
        CliCommand::Signals(args) => commands::run_signals_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Session(SessionError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<SessionError> for CliError {
    fn from(error: SessionError) -> Self {
        Self::Session(error)
    }
}

impl CliError {
    fn as_session_error(&self) -> SessionError {
        match self {
            Self::Usage(message) => SessionError::configuration("CLI.USAGE", message.trim_end()),
            Self::Session(error) => error.clone(),
            Self::Internal(error) => SessionError::io("IO.CLI", format!("{error:#}")),
        }
    }
}
