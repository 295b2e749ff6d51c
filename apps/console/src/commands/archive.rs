use freightdesk_application::{ArchivalSummary, ArchivePreview};
use freightdesk_core::{AppError, AppResult};
use freightdesk_domain::{EventType, RetentionDays};

use crate::cli::ArchiveArgs;
use crate::console_state::ConsoleState;
use crate::output::{Table, format_megabytes, format_timestamp};
use crate::terminal::{Terminal, confirm_unless_forced};

use super::print_failures;

/// Runs `audit:archive`.
pub async fn run(
    state: &ConsoleState,
    args: &ArchiveArgs,
    terminal: &mut dyn Terminal,
) -> AppResult<bool> {
    validate(args)?;
    let days = args.days.map(RetentionDays::new).transpose()?;
    let event_type = args.event_type.as_deref().map(EventType::new).transpose()?;

    if args.list {
        return list(state, terminal).await;
    }

    if let Some(filename) = &args.restore {
        return restore(state, filename, args.force, terminal).await;
    }

    let engine = state.engine().await?;
    let preview = engine.preview_archive(days).await?;
    let pending = print_preview(terminal, &preview, event_type.as_ref());

    if args.preview {
        return Ok(true);
    }

    if pending == 0 {
        terminal.print("No audit logs are old enough to archive.");
        return Ok(true);
    }

    let question = format!("Archive {pending} audit log record(s) and remove them from the live table?");
    if !confirm_unless_forced(terminal, args.force, question.as_str()).await? {
        terminal.print("Archival cancelled.");
        return Ok(true);
    }

    let orchestrator = state.orchestrator(engine);
    let summary = match &event_type {
        Some(event_type) => orchestrator.archive_by_event_type(event_type).await?,
        None => orchestrator.archive_old_logs(days).await?,
    };

    print_summary(terminal, &summary);
    Ok(!summary.has_errors())
}

fn validate(args: &ArchiveArgs) -> AppResult<()> {
    let modes = [args.list, args.restore.is_some(), args.preview]
        .into_iter()
        .filter(|selected| *selected)
        .count();
    if modes > 1 {
        return Err(AppError::Validation(
            "--list, --restore and --preview cannot be combined".to_owned(),
        ));
    }

    if (args.list || args.restore.is_some()) && (args.event_type.is_some() || args.days.is_some())
    {
        return Err(AppError::Validation(
            "--event-type and --days do not apply to --list or --restore".to_owned(),
        ));
    }

    if args.event_type.is_some() && args.days.is_some() {
        return Err(AppError::Validation(
            "--event-type archives by policy threshold and cannot be combined with --days"
                .to_owned(),
        ));
    }

    Ok(())
}

async fn list(state: &ConsoleState, terminal: &mut dyn Terminal) -> AppResult<bool> {
    let listing = state.orchestrator(state.engine().await?).list_archive_files().await?;

    if listing.files.is_empty() {
        terminal.print("No archive files found.");
        return Ok(true);
    }

    let mut table = Table::new(&["File", "Event type", "Period", "Size", "Modified"]);
    for file in &listing.files {
        table.push_row(vec![
            file.filename.clone(),
            file.event_type.to_string(),
            file.period.clone(),
            format_megabytes(file.size_mb()),
            format_timestamp(file.modified_at),
        ]);
    }

    terminal.print(&table.render());
    terminal.print(&format!(
        "{} file(s), {} total",
        listing.files.len(),
        format_megabytes(listing.total_size_mb)
    ));
    Ok(true)
}

async fn restore(
    state: &ConsoleState,
    filename: &str,
    force: bool,
    terminal: &mut dyn Terminal,
) -> AppResult<bool> {
    let question =
        format!("Restore audit logs from {filename}? Rows are re-inserted with their original ids.");
    if !confirm_unless_forced(terminal, force, question.as_str()).await? {
        terminal.print("Restore cancelled.");
        return Ok(true);
    }

    let summary = state
        .orchestrator(state.engine().await?)
        .restore_from_archive(filename)
        .await?;

    let mut table = Table::new(&["Event type", "Restored"]);
    for (event_type, count) in &summary.restored_by_type {
        table.push_row(vec![event_type.to_string(), count.to_string()]);
    }
    if !table.is_empty() {
        terminal.print(&table.render());
    }
    terminal.print(&format!(
        "Restored {} record(s) from {}.",
        summary.total_restored, summary.filename
    ));
    print_failures(terminal, &summary.errors);

    Ok(!summary.has_errors())
}

fn print_preview(
    terminal: &mut dyn Terminal,
    preview: &ArchivePreview,
    only: Option<&EventType>,
) -> u64 {
    let mut table = Table::new(&["Event type", "Archive after", "Cutoff", "Records"]);
    let mut pending = 0_u64;

    for (event_type, info) in &preview.by_event_type {
        if only.is_some_and(|only| only != event_type) {
            continue;
        }

        pending = pending.saturating_add(info.count);
        table.push_row(vec![
            event_type.to_string(),
            format!("{} days", info.threshold_days),
            format_timestamp(info.cutoff_date),
            info.count.to_string(),
        ]);
    }

    if !table.is_empty() {
        terminal.print(&table.render());
    }
    terminal.print(&format!("{pending} record(s) eligible for archival."));
    pending
}

fn print_summary(terminal: &mut dyn Terminal, summary: &ArchivalSummary) {
    let mut table = Table::new(&["Event type", "Archived"]);
    for (event_type, count) in &summary.archived_by_type {
        table.push_row(vec![event_type.to_string(), count.to_string()]);
    }
    if !table.is_empty() {
        terminal.print(&table.render());
    }

    terminal.print(&format!(
        "Archived {} record(s) into {} file(s).",
        summary.total_archived,
        summary.archive_files.len()
    ));
    for file in &summary.archive_files {
        terminal.print(&format!("  {file}"));
    }
    print_failures(terminal, &summary.errors);
}
