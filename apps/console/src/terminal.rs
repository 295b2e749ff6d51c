use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use freightdesk_core::{AppError, AppResult};

/// Operator-facing output and confirmation prompts.
#[async_trait]
pub trait Terminal: Send {
    /// Writes one block of output followed by a newline.
    fn print(&mut self, text: &str);

    /// Asks a yes/no question; anything other than `y` or `yes` declines.
    async fn confirm(&mut self, question: &str) -> AppResult<bool>;
}

/// Terminal bound to the process stdout and stdin.
#[derive(Debug, Default)]
pub struct StdTerminal;

#[async_trait]
impl Terminal for StdTerminal {
    fn print(&mut self, text: &str) {
        println!("{text}");
    }

    async fn confirm(&mut self, question: &str) -> AppResult<bool> {
        print!("{question} [y/N] ");
        std::io::stdout()
            .flush()
            .map_err(|error| AppError::Internal(format!("failed to flush stdout: {error}")))?;

        let mut answer = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut answer)
            .await
            .map_err(|error| AppError::Internal(format!("failed to read confirmation: {error}")))?;

        Ok(is_affirmative(answer.as_str()))
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Returns `true` when the operator forced the run or agreed to it.
pub async fn confirm_unless_forced(
    terminal: &mut dyn Terminal,
    force: bool,
    question: &str,
) -> AppResult<bool> {
    if force {
        return Ok(true);
    }

    terminal.confirm(question).await
}
