//! `depmatrix` command-line entry point.
//!
//! # Responsibility
//! - Resolve configuration from flags and environment.
//! - Start file logging, open the database and dispatch one subcommand.
//! - Map failures to a one-line stderr message and a non-zero exit status.

mod cli;
mod commands;
mod render;

use clap::Parser;
use cli::Cli;
use commands::{CliError, Context};
use depmatrix_core::{core_version, init_logging, open_db, AppConfig};
use log::{error, info};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = AppConfig::from_env().with_overrides(
        cli.db.clone(),
        cli.log_dir.clone(),
        cli.log_level.clone(),
    );

    // Logging is best effort; the command still runs without it.
    if let Err(err) = init_logging(&config.log_level, &config.log_dir.to_string_lossy()) {
        eprintln!("warning: logging disabled: {err}");
    }
    info!(
        "event=cli_start module=cli status=ok version={} db_path={}",
        core_version(),
        config.db_path.display()
    );

    match run(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli, config: &AppConfig) -> Result<(), CliError> {
    let conn = open_db(&config.db_path)?;
    let ctx = Context::new(&conn, cli.token);
    commands::run(&ctx, cli.command)
}

fn exit_code(err: &CliError) -> u8 {
    use depmatrix_core::ServiceError;
    match err {
        CliError::MissingToken
        | CliError::Service(ServiceError::Unauthenticated(_)) => 3,
        CliError::Service(ServiceError::Forbidden { .. })
        | CliError::Service(ServiceError::AccessDenied(_)) => 4,
        CliError::Service(ServiceError::NotFound { .. }) => 5,
        CliError::Service(ServiceError::Validation(_))
        | CliError::Service(ServiceError::Matrix(_))
        | CliError::Service(ServiceError::Conflict { .. })
        | CliError::ReadFile { .. }
        | CliError::Json(_) => 2,
        _ => 1,
    }
}
