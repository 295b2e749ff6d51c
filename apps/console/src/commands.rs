//! Handlers for the `audit:*` console commands.
//!
//! Each handler returns `Ok(true)` when the run finished without per-type
//! failures, so the binary can map it to an exit code.

mod archive;
mod cleanup;
mod retention;


use freightdesk_application::RunFailure;
use freightdesk_core::{AppError, AppResult};

use crate::cli::Command;
use crate::console_state::ConsoleState;
use crate::output::Table;
use crate::terminal::Terminal;

pub use archive::run as run_archive;
pub use cleanup::run as run_cleanup;
pub use retention::run as run_retention;

/// Runs one parsed console command.
pub async fn dispatch(
    state: &ConsoleState,
    command: &Command,
    terminal: &mut dyn Terminal,
) -> AppResult<bool> {
    match command {
        Command::Archive(args) => run_archive(state, args, terminal).await,
        Command::Cleanup(args) => run_cleanup(state, args, terminal).await,
        Command::Retention(args) => run_retention(state, args, terminal).await,
        Command::Migrate => Err(AppError::Internal(
            "migrate is handled before command dispatch".to_owned(),
        )),
    }
}

fn print_failures(terminal: &mut dyn Terminal, failures: &[RunFailure]) {
    if failures.is_empty() {
        return;
    }

    let mut table = Table::new(&["Event type", "Stage", "Error"]);
    for failure in failures {
        table.push_row(vec![
            failure.event_type.to_string(),
            failure.stage.as_str().to_owned(),
            failure.message.clone(),
        ]);
    }

    terminal.print(&format!("{} event type(s) failed:", failures.len()));
    terminal.print(&table.render());
}
