use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use freightdesk_domain::{ArchiveFile, EventType, RetentionDays};

/// Stage of a retention run at which an event type failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    /// Acquiring or releasing the per-event-type lease.
    Leasing,
    /// Selecting rows past the threshold.
    Selecting,
    /// Writing the archive file.
    Archiving,
    /// Deleting rows from the live table.
    Deleting,
    /// Re-inserting rows from an archive.
    Restoring,
    /// Appending the run's own audit record.
    Recording,
}

impl RunStage {
    /// Returns a stable label for this stage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leasing => "leasing",
            Self::Selecting => "selecting",
            Self::Archiving => "archiving",
            Self::Deleting => "deleting",
            Self::Restoring => "restoring",
            Self::Recording => "recording",
        }
    }
}

/// One per-event-type failure collected during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    /// Event type that failed.
    pub event_type: EventType,
    /// Stage at which it failed.
    pub stage: RunStage,
    /// Rendered error message.
    pub message: String,
}

impl RunFailure {
    /// Creates a failure entry.
    #[must_use]
    pub fn new(event_type: EventType, stage: RunStage, message: impl Into<String>) -> Self {
        Self {
            event_type,
            stage,
            message: message.into(),
        }
    }
}

/// Cleanup analysis for one event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCleanupInfo {
    /// Rows strictly older than the cutoff.
    pub count: u64,
    /// Effective retention window.
    pub retention_days: RetentionDays,
    /// Deletion cutoff.
    pub cutoff_date: DateTime<Utc>,
    /// Oldest row of this type, if any.
    pub oldest_record: Option<DateTime<Utc>>,
}

/// Read-only cleanup preview across event types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupPreview {
    /// Rows that a policy-driven cleanup would delete.
    pub total_to_delete: u64,
    /// Per-type breakdown, including types with nothing to delete.
    pub by_event_type: BTreeMap<EventType, TypeCleanupInfo>,
    /// Instant the preview was computed at.
    pub generated_at: DateTime<Utc>,
}

impl CleanupPreview {
    /// Returns event types that currently have expired rows.
    #[must_use]
    pub fn event_types_needing_cleanup(&self) -> Vec<&EventType> {
        self.by_event_type
            .iter()
            .filter(|(_, info)| info.count > 0)
            .map(|(event_type, _)| event_type)
            .collect()
    }
}

/// Archive analysis for one event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeArchiveInfo {
    /// Rows strictly older than the archive cutoff.
    pub count: u64,
    /// Threshold applied to this type.
    pub threshold_days: RetentionDays,
    /// Archive cutoff.
    pub cutoff_date: DateTime<Utc>,
}

/// Read-only archival preview across event types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivePreview {
    /// Rows an archival run would move.
    pub total_to_archive: u64,
    /// Per-type breakdown.
    pub by_event_type: BTreeMap<EventType, TypeArchiveInfo>,
}

/// Aggregate size of the live table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageStatistics {
    /// Rows across every event type.
    pub total_records: u64,
    /// Row count times the fixed average row size, in megabytes.
    pub estimated_storage_mb: f64,
    /// Row counts per event type.
    pub records_by_type: BTreeMap<EventType, u64>,
}

/// Reason behind one retention suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OptimizationReason {
    /// The type produces many rows per day.
    HighVolume {
        /// Average rows per day over the sampling window.
        daily_average: u64,
    },
    /// The type is kept longer than a non-compliance type needs.
    ExcessiveRetention,
}

impl OptimizationReason {
    /// Returns an operator-facing description.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::HighVolume { daily_average } => {
                format!("high volume (~{daily_average} records/day)")
            }
            Self::ExcessiveRetention => "retention exceeds one year for a non-compliance type"
                .to_owned(),
        }
    }
}

/// Advisory retention change for one event type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionOptimization {
    /// Event type the suggestion applies to.
    pub event_type: EventType,
    /// Window currently in effect.
    pub current_days: RetentionDays,
    /// Suggested window.
    pub recommended_days: RetentionDays,
    /// Why the change is suggested.
    pub reason: OptimizationReason,
    /// Rows that would become eligible for deletion.
    pub affected_records: u64,
    /// Estimated freed storage in megabytes.
    pub estimated_savings_mb: f64,
}

/// Advisory output of the retention optimizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationReport {
    /// Suggestions ordered by event type.
    pub optimizations: Vec<RetentionOptimization>,
    /// Sum of per-suggestion savings in megabytes.
    pub estimated_savings_mb: f64,
}

/// Result of one archival run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivalSummary {
    /// Rows archived and then deleted.
    pub total_archived: u64,
    /// Archived rows per event type.
    pub archived_by_type: BTreeMap<EventType, u64>,
    /// Archive filenames written in this run.
    pub archive_files: Vec<String>,
    /// Per-type failures.
    pub errors: Vec<RunFailure>,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub completed_at: DateTime<Utc>,
}

impl ArchivalSummary {
    /// Returns whether any event type failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Result of a targeted cleanup: one type, or one global cutoff.
///
/// `deleted` is committed even when `errors` reports a later lease release
/// or purge-record failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupOutcome {
    /// Rows deleted.
    pub deleted: u64,
    /// Failures after the delete committed.
    pub errors: Vec<RunFailure>,
}

impl CleanupOutcome {
    /// Returns whether any post-delete step failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Result of a policy-driven cleanup across event types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutomatedCleanupSummary {
    /// Rows deleted across types.
    pub total_deleted: u64,
    /// Deleted rows per event type.
    pub deleted_by_type: BTreeMap<EventType, u64>,
    /// Per-type failures.
    pub errors: Vec<RunFailure>,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub completed_at: DateTime<Utc>,
}

impl AutomatedCleanupSummary {
    /// Returns whether any event type failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Result of restoring one archive file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    /// Archive that was restored.
    pub filename: String,
    /// Rows re-inserted.
    pub total_restored: u64,
    /// Re-inserted rows per event type.
    pub restored_by_type: BTreeMap<EventType, u64>,
    /// Per-type failures, such as duplicate ids.
    pub errors: Vec<RunFailure>,
}

impl RestoreSummary {
    /// Returns whether any event type failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Archive files with their aggregated size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveListing {
    /// Files sorted by filename.
    pub files: Vec<ArchiveFile>,
    /// Sum of per-file sizes in megabytes.
    pub total_size_mb: f64,
}

/// One configured retention window as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyEntry {
    /// Event type.
    pub event_type: EventType,
    /// Configured window.
    pub retention_days: RetentionDays,
    /// Approximate span such as `~1.1 years`.
    pub human_span: String,
    /// Archive threshold derived from the window.
    pub archive_threshold_days: RetentionDays,
}

/// Current policy as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyOverview {
    /// Global fallback window.
    pub default_days: RetentionDays,
    /// Explicitly configured windows ordered by event type.
    pub entries: Vec<PolicyEntry>,
}
