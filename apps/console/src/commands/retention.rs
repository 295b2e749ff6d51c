use freightdesk_application::{OptimizationReport, RetentionEngine, parse_policy_assignment};
use freightdesk_core::AppResult;

use crate::cli::RetentionArgs;
use crate::console_state::ConsoleState;
use crate::output::{Table, format_megabytes};
use crate::terminal::{Terminal, confirm_unless_forced};

/// Runs `audit:retention`.
///
/// Flags run in a fixed order: `--set-policy`, then optimizations, then
/// `--show-policies`, then `--status`. With no flag the status view is shown.
pub async fn run(
    state: &ConsoleState,
    args: &RetentionArgs,
    terminal: &mut dyn Terminal,
) -> AppResult<bool> {
    let service = state.policy_service();

    if let Some(assignment) = &args.set_policy {
        let (event_type, days) = parse_policy_assignment(assignment)?;
        service
            .set_retention_days(&event_type, days.days(), None)
            .await?;
        terminal.print(&format!(
            "Retention for '{event_type}' set to {days} days ({}).",
            days.human_span()
        ));
    }

    if args.optimize || args.apply_optimizations {
        let report = state.engine().await?.optimize_retention_policies().await?;
        print_optimizations(terminal, &report);

        if args.apply_optimizations && !report.optimizations.is_empty() {
            let question = format!(
                "Apply {} recommended retention change(s)?",
                report.optimizations.len()
            );
            if confirm_unless_forced(terminal, args.force, question.as_str()).await? {
                service.apply_optimizations(&report, None).await?;
                terminal.print(&format!(
                    "Applied {} retention change(s).",
                    report.optimizations.len()
                ));
            } else {
                terminal.print("Optimizations not applied.");
            }
        }
    }

    if args.show_policies {
        let overview = service.show_policies().await?;
        let mut table = Table::new(&["Event type", "Retention", "Span", "Archive after"]);
        for entry in &overview.entries {
            table.push_row(vec![
                entry.event_type.to_string(),
                format!("{} days", entry.retention_days),
                entry.human_span.clone(),
                format!("{} days", entry.archive_threshold_days),
            ]);
        }

        if !table.is_empty() {
            terminal.print(&table.render());
        }
        terminal.print(&format!(
            "Unlisted event types keep {} days ({}).",
            overview.default_days,
            overview.default_days.human_span()
        ));
    }

    let nothing_selected = args.set_policy.is_none()
        && !args.optimize
        && !args.apply_optimizations
        && !args.show_policies;
    if args.status || nothing_selected {
        print_status(state, &state.engine().await?, terminal).await?;
    }

    Ok(true)
}

fn print_optimizations(terminal: &mut dyn Terminal, report: &OptimizationReport) {
    if report.optimizations.is_empty() {
        terminal.print("Retention policies are already optimal.");
        return;
    }

    let mut table = Table::new(&[
        "Event type",
        "Current",
        "Recommended",
        "Reason",
        "Affected",
        "Savings",
    ]);
    for optimization in &report.optimizations {
        table.push_row(vec![
            optimization.event_type.to_string(),
            format!("{} days", optimization.current_days),
            format!("{} days", optimization.recommended_days),
            optimization.reason.describe(),
            optimization.affected_records.to_string(),
            format_megabytes(optimization.estimated_savings_mb),
        ]);
    }

    terminal.print(&table.render());
    terminal.print(&format!(
        "Estimated savings: {}",
        format_megabytes(report.estimated_savings_mb)
    ));
}

async fn print_status(
    state: &ConsoleState,
    engine: &RetentionEngine,
    terminal: &mut dyn Terminal,
) -> AppResult<()> {
    let statistics = engine.storage_statistics().await?;
    let preview = engine.preview_cleanup().await?;
    let archives = state.orchestrator(engine.clone()).list_archive_files().await?;

    let mut table = Table::new(&["Event type", "Records", "Retention", "Expired"]);
    for (event_type, count) in &statistics.records_by_type {
        let expired = preview
            .by_event_type
            .get(event_type)
            .map_or(0, |info| info.count);
        table.push_row(vec![
            event_type.to_string(),
            count.to_string(),
            format!("{} days", engine.policy().retention_days_for(event_type)),
            expired.to_string(),
        ]);
    }

    if !table.is_empty() {
        terminal.print(&table.render());
    }
    terminal.print(&format!(
        "Live records: {} (~{})",
        statistics.total_records,
        format_megabytes(statistics.estimated_storage_mb)
    ));
    terminal.print(&format!(
        "Pending cleanup: {} record(s)",
        preview.total_to_delete
    ));
    let needing_cleanup = preview.event_types_needing_cleanup();
    if !needing_cleanup.is_empty() {
        let names = needing_cleanup
            .iter()
            .map(|event_type| event_type.as_str())
            .collect::<Vec<_>>();
        terminal.print(&format!("Needs cleanup: {}", names.join(", ")));
    }
    terminal.print(&format!(
        "Archives: {} file(s), {}",
        archives.files.len(),
        format_megabytes(archives.total_size_mb)
    ));

    Ok(())
}
