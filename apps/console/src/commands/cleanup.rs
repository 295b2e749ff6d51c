use freightdesk_application::CleanupPreview;
use freightdesk_core::AppResult;
use freightdesk_domain::{EventType, RetentionDays, RetentionPolicy};

use crate::cli::CleanupArgs;
use crate::console_state::ConsoleState;
use crate::output::{Table, format_optional_timestamp, format_timestamp};
use crate::terminal::{Terminal, confirm_unless_forced};

use super::print_failures;

/// Runs `audit:cleanup`.
///
/// Without `--days` every type uses its own window. With `--days` alone one
/// cutoff applies to every type, ignoring per-type policies.
pub async fn run(
    state: &ConsoleState,
    args: &CleanupArgs,
    terminal: &mut dyn Terminal,
) -> AppResult<bool> {
    let days = args.days.map(RetentionDays::new).transpose()?;
    let event_type = args.event_type.as_deref().map(EventType::new).transpose()?;

    let engine = state.engine().await?;
    let preview = match days {
        // A policy with no entries applies one window to every type present.
        Some(days) => {
            engine
                .with_policy(RetentionPolicy::new(days))
                .preview_cleanup()
                .await?
        }
        None => engine.preview_cleanup().await?,
    };
    let pending = print_preview(terminal, &preview, event_type.as_ref());

    if args.preview {
        return Ok(true);
    }

    if pending == 0 {
        terminal.print("Nothing to clean up.");
        return Ok(true);
    }

    let question = if args.archive {
        format!("Archive and then permanently delete {pending} audit log record(s)?")
    } else {
        format!("Permanently delete {pending} audit log record(s)? This cannot be undone.")
    };
    if !confirm_unless_forced(terminal, args.force, question.as_str()).await? {
        terminal.print("Cleanup cancelled.");
        return Ok(true);
    }

    if args.archive {
        let archival = match (&event_type, days) {
            (Some(event_type), Some(days)) => {
                let mut policy = engine.policy().clone();
                policy.set(event_type.clone(), days);
                state
                    .orchestrator(engine.with_policy(policy))
                    .archive_by_event_type(event_type)
                    .await?
            }
            (Some(event_type), None) => {
                state
                    .orchestrator(engine.clone())
                    .archive_by_event_type(event_type)
                    .await?
            }
            (None, days) => state.orchestrator(engine.clone()).archive_old_logs(days).await?,
        };

        terminal.print(&format!(
            "Archived {} record(s) into {} file(s).",
            archival.total_archived,
            archival.archive_files.len()
        ));
        if archival.has_errors() {
            print_failures(terminal, &archival.errors);
            terminal.print("Cleanup skipped because archival did not complete.");
            return Ok(false);
        }
    }

    let retention = event_type
        .as_ref()
        .map(|event_type| days.unwrap_or_else(|| engine.policy().retention_days_for(event_type)));
    let cleanup = state.cleanup_engine(engine);

    match (&event_type, retention, days) {
        (Some(event_type), Some(retention), _) => {
            let outcome = cleanup.cleanup_event_type(event_type, retention).await?;
            terminal.print(&format!(
                "Deleted {} '{event_type}' record(s) older than {retention} days.",
                outcome.deleted
            ));
            print_failures(terminal, &outcome.errors);
            Ok(!outcome.has_errors())
        }
        (None, _, Some(days)) => {
            let outcome = cleanup.cleanup_older_than(days).await?;
            terminal.print(&format!(
                "Deleted {} record(s) older than {days} days.",
                outcome.deleted
            ));
            print_failures(terminal, &outcome.errors);
            Ok(!outcome.has_errors())
        }
        _ => {
            let summary = cleanup.run_automated_cleanup().await?;
            let mut table = Table::new(&["Event type", "Deleted"]);
            for (event_type, count) in &summary.deleted_by_type {
                table.push_row(vec![event_type.to_string(), count.to_string()]);
            }
            if !table.is_empty() {
                terminal.print(&table.render());
            }
            terminal.print(&format!("Deleted {} record(s).", summary.total_deleted));
            print_failures(terminal, &summary.errors);
            Ok(!summary.has_errors())
        }
    }
}

fn print_preview(
    terminal: &mut dyn Terminal,
    preview: &CleanupPreview,
    only: Option<&EventType>,
) -> u64 {
    let mut table = Table::new(&["Event type", "Retention", "Cutoff", "Oldest", "Expired"]);
    let mut pending = 0_u64;

    for (event_type, info) in &preview.by_event_type {
        if only.is_some_and(|only| only != event_type) {
            continue;
        }

        pending = pending.saturating_add(info.count);
        table.push_row(vec![
            event_type.to_string(),
            format!("{} days", info.retention_days),
            format_timestamp(info.cutoff_date),
            format_optional_timestamp(info.oldest_record),
            info.count.to_string(),
        ]);
    }

    if !table.is_empty() {
        terminal.print(&table.render());
    }
    terminal.print(&format!("{pending} record(s) past their retention window."));
    pending
}
