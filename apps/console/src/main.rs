//! Freightdesk operator console for audit log retention.

#![forbid(unsafe_code)]

mod cli;
mod commands;
mod console_config;
mod console_state;
mod output;
mod terminal;

use std::process::ExitCode;

use clap::Parser;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use freightdesk_core::{AppError, AppResult};
use freightdesk_infrastructure::MIGRATOR;

use crate::cli::{Cli, Command};
use crate::console_config::ConsoleConfig;
use crate::console_state::ConsoleState;
use crate::terminal::StdTerminal;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            error!(error = %error, "console command failed");
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<bool> {
    let config = ConsoleConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;

    if matches!(cli.command, Command::Migrate) {
        MIGRATOR.run(&pool).await.map_err(|error| {
            AppError::Internal(format!("failed to run database migrations: {error}"))
        })?;
        info!("database migrations applied");
        return Ok(true);
    }

    let state = ConsoleState::from_config(&config, pool)?;
    let mut terminal = StdTerminal;
    commands::dispatch(&state, &cli.command, &mut terminal).await
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(4)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
