mod commands;
mod helpers;

use clap::Parser;
use nmrproc_core::domain::ProcessingError;
use std::path::PathBuf;

/// Runs the command line in `std::env::args` and returns the process exit code.
pub fn run_from_env() -> i32 {
    let Err(error) = parse_and_dispatch(std::env::args()) else {
        return 0;
    };
    let error = error.into_processing_error();
    eprintln!("{}", error.diagnostic_line());
    eprintln!("{}", error.fatal_exit_line());
    error.exit_code()
}

fn parse_and_dispatch<I>(args: I) -> Result<(), CliError>
where
    I: IntoIterator<Item = String>,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error)
            if matches!(
                error.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            print!("{}", error);
            return Ok(());
        }
        Err(error) => return Err(CliError::Usage(error.to_string())),
    };

    let config = helpers::load_config(cli.config.as_deref())?;
    helpers::init_logging(cli.log_level.as_deref().unwrap_or(&config.log_filter));
    match cli.command {
        CliCommand::Order(args) => commands::run_order_command(args),
        CliCommand::Groups(args) => commands::run_groups_command(args),
        CliCommand::CheckScript(args) => commands::run_check_script_command(args),
        CliCommand::Assemble(args) => commands::run_assemble_command(args, &config),
        CliCommand::Process(args) => commands::run_process_command(args, &config),
        CliCommand::Batch(args) => commands::run_batch_command(args, &config),
    }
}

#[derive(Parser)]
#[command(name = "nmrproc", about = "Multi-dimensional NMR acquisition decoding and processing")]
struct Cli {
    /// Processing config (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `nmrproc_core=debug`; RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Validate an acquisition order and print its normalized form
    Order(commands::OrderArgs),
    /// Print raw vector offsets for a range of rows
    Groups(commands::GroupsArgs),
    /// Parse a processing script and list its blocks
    CheckScript(commands::CheckScriptArgs),
    /// Render a full script, a single-block fragment or a batch script
    Assemble(commands::AssembleArgs),
    /// Process one JSON dataset with a script
    Process(commands::ProcessArgs),
    /// Process many JSON datasets with one script
    Batch(commands::BatchArgs),
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Processing(ProcessingError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ProcessingError> for CliError {
    fn from(error: ProcessingError) -> Self {
        Self::Processing(error)
    }
}

impl CliError {
    fn into_processing_error(self) -> ProcessingError {
        match self {
            Self::Usage(message) => ProcessingError::input_validation("INPUT.CLI_USAGE", message),
            Self::Processing(error) => error,
            Self::Internal(error) => ProcessingError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
