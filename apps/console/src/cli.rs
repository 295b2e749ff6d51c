use clap::{Args, Parser, Subcommand};

/// Operator commands for audit log retention and archival.
#[derive(Debug, Parser)]
#[command(name = "freightdesk-console", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Archive audit logs past their archive threshold, list archives or restore one.
    #[command(name = "audit:archive")]
    Archive(ArchiveArgs),
    /// Delete audit logs past their retention window.
    #[command(name = "audit:cleanup")]
    Cleanup(CleanupArgs),
    /// Inspect and tune retention policies.
    #[command(name = "audit:retention")]
    Retention(RetentionArgs),
    /// Apply database migrations and exit.
    Migrate,
}

#[derive(Debug, Default, Args)]
pub struct ArchiveArgs {
    /// Archive only this event type, using its policy threshold.
    #[arg(long, value_name = "EVENT_TYPE")]
    pub event_type: Option<String>,

    /// Archive records older than this many days for every event type.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub days: Option<u16>,

    /// List archive files instead of archiving.
    #[arg(long)]
    pub list: bool,

    /// Restore records from an archive file such as `security/2025-01-01_2025-01-31.csv`.
    #[arg(long, value_name = "FILE")]
    pub restore: Option<String>,

    /// Show what would be archived without changing anything.
    #[arg(long)]
    pub preview: bool,

    /// Skip the confirmation prompt.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Default, Args)]
pub struct CleanupArgs {
    /// Show what would be deleted without changing anything.
    #[arg(long)]
    pub preview: bool,

    /// Clean up only this event type.
    #[arg(long, value_name = "EVENT_TYPE")]
    pub event_type: Option<String>,

    /// Override the policy window with one cutoff in days.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub days: Option<u16>,

    /// Archive records before deleting them.
    #[arg(long)]
    pub archive: bool,

    /// Skip the confirmation prompt.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Default, Args)]
pub struct RetentionArgs {
    /// Show storage usage and pending cleanup. Default when no other flag is given.
    #[arg(long)]
    pub status: bool,

    /// Suggest shorter windows for high-volume or over-retained event types.
    #[arg(long)]
    pub optimize: bool,

    /// Write the suggested windows to the policy.
    #[arg(long)]
    pub apply_optimizations: bool,

    /// Set one window, for example `security:400`.
    #[arg(long, value_name = "EVENT_TYPE:DAYS")]
    pub set_policy: Option<String>,

    /// Show the configured windows.
    #[arg(long)]
    pub show_policies: bool,

    /// Skip the confirmation prompt.
    #[arg(long)]
    pub force: bool,
}
