use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use freightdesk_core::{AppError, AppResult};
use freightdesk_domain::{
    ArchivePeriod, AuditLogRecord, EventType, NewAuditLogRecord, RetentionAuditAction,
    RetentionDays, bytes_to_megabytes,
};

use crate::retention_engine::RetentionEngine;
use crate::retention_lease::LeaseSettings;
use crate::retention_ports::{
    ArchivalLease, ArchivalLeaseCoordinator, ArchivalSummary, ArchiveListing, ArchiveWriter,
    RunFailure, RunStage,
};

mod restore;


/// Maximum ids per delete statement.
pub const DELETE_CHUNK_SIZE: usize = 1_000;

/// Outcome of one event type's pass through the archival state machine.
enum ArchivalStep {
    /// Nothing was past the threshold.
    Empty,
    /// Rows were written to `filename` and `count` of them deleted.
    Archived { filename: String, count: u64 },
    /// Rows were written but not all of them left the live table.
    ArchivedNotDeleted {
        filename: String,
        deleted: u64,
        failure: RunFailure,
    },
    /// The type failed before any row left the live table.
    Failed(RunFailure),
}

/// Delete that stopped after some chunks had already committed.
struct PartialDelete {
    deleted: u64,
    error: AppError,
}

/// Drives select, archive, delete and aggregate per event type.
#[derive(Clone)]
pub struct ArchivalOrchestrator {
    engine: RetentionEngine,
    archive_writer: Arc<dyn ArchiveWriter>,
    lease: Option<LeaseSettings>,
}

impl ArchivalOrchestrator {
    /// Creates an orchestrator over one run's engine.
    #[must_use]
    pub fn new(engine: RetentionEngine, archive_writer: Arc<dyn ArchiveWriter>) -> Self {
        Self {
            engine,
            archive_writer,
            lease: None,
        }
    }

    /// Guards each event type with a lease so overlapping runs skip it.
    #[must_use]
    pub fn with_lease_coordinator(
        mut self,
        coordinator: Arc<dyn ArchivalLeaseCoordinator>,
        holder_id: impl Into<String>,
        lease_seconds: u32,
    ) -> Self {
        self.lease = Some(LeaseSettings::new(coordinator, holder_id, lease_seconds));
        self
    }

    /// Returns the engine used for selection.
    #[must_use]
    pub fn engine(&self) -> &RetentionEngine {
        &self.engine
    }

    /// Archives every event type past its threshold.
    ///
    /// With `days` omitted each type uses its policy's archive threshold;
    /// otherwise `days` applies to every type.
    pub async fn archive_old_logs(&self, days: Option<RetentionDays>) -> AppResult<ArchivalSummary> {
        let scope = self
            .engine
            .event_types_in_scope()
            .await?
            .into_iter()
            .map(|event_type| {
                let threshold = self.engine.archive_threshold_for(&event_type, days);
                (event_type, threshold)
            })
            .collect::<Vec<_>>();

        self.run(scope).await
    }

    /// Archives one event type using its policy's archive threshold.
    pub async fn archive_by_event_type(&self, event_type: &EventType) -> AppResult<ArchivalSummary> {
        let threshold = self.engine.archive_threshold_for(event_type, None);
        self.run(vec![(event_type.clone(), threshold)]).await
    }

    /// Lists archive files sorted by filename with their total size.
    pub async fn list_archive_files(&self) -> AppResult<ArchiveListing> {
        let mut files = self.archive_writer.list_archive_files().await?;
        files.sort_by(|left, right| left.filename.cmp(&right.filename));
        let total_bytes = files
            .iter()
            .fold(0_u64, |total, file| total.saturating_add(file.size_bytes));

        Ok(ArchiveListing {
            files,
            total_size_mb: bytes_to_megabytes(total_bytes),
        })
    }

    async fn run(&self, scope: Vec<(EventType, RetentionDays)>) -> AppResult<ArchivalSummary> {
        let started_at = self.engine.now();
        let mut archived_by_type = BTreeMap::new();
        let mut archive_files = Vec::new();
        let mut errors = Vec::new();
        let mut total_archived = 0_u64;

        for (event_type, threshold) in scope {
            let lease = match &self.lease {
                Some(settings) => match settings.acquire(&event_type).await {
                    Ok(lease) => Some(lease),
                    Err(error) => {
                        errors.push(RunFailure::new(
                            event_type,
                            RunStage::Leasing,
                            error.to_string(),
                        ));
                        continue;
                    }
                },
                None => None,
            };

            match self
                .archive_event_type(&event_type, threshold, lease.as_ref())
                .await
            {
                ArchivalStep::Empty => {}
                ArchivalStep::Archived { filename, count } => {
                    total_archived = total_archived.saturating_add(count);
                    archived_by_type.insert(event_type.clone(), count);
                    archive_files.push(filename);
                }
                ArchivalStep::ArchivedNotDeleted {
                    filename,
                    deleted,
                    failure,
                } => {
                    if deleted > 0 {
                        total_archived = total_archived.saturating_add(deleted);
                        archived_by_type.insert(event_type.clone(), deleted);
                    }
                    archive_files.push(filename);
                    errors.push(failure);
                }
                ArchivalStep::Failed(failure) => errors.push(failure),
            }

            if let (Some(settings), Some(lease)) = (&self.lease, lease)
                && let Err(error) = settings.release(&lease).await
            {
                errors.push(RunFailure::new(
                    event_type,
                    RunStage::Leasing,
                    error.to_string(),
                ));
            }
        }

        if total_archived > 0 {
            let record = NewAuditLogRecord::new(
                EventType::system(),
                RetentionAuditAction::AuditLogsArchived.as_str(),
                None,
                Some(json!({
                    "total_archived": total_archived,
                    "archived_by_type": archived_by_type,
                    "archive_files": archive_files,
                })),
            )?;
            if let Err(error) = self.engine.repository().append_record(record).await {
                errors.push(RunFailure::new(
                    EventType::system(),
                    RunStage::Recording,
                    error.to_string(),
                ));
            }
        }

        Ok(ArchivalSummary {
            total_archived,
            archived_by_type,
            archive_files,
            errors,
            started_at,
            completed_at: self.engine.now(),
        })
    }

    async fn archive_event_type(
        &self,
        event_type: &EventType,
        threshold: RetentionDays,
        lease: Option<&ArchivalLease>,
    ) -> ArchivalStep {
        let records = match self.engine.archive_candidates(event_type, threshold).await {
            Ok(records) => records,
            Err(error) => {
                return ArchivalStep::Failed(RunFailure::new(
                    event_type.clone(),
                    RunStage::Selecting,
                    error.to_string(),
                ));
            }
        };

        let Some(period) = ArchivePeriod::covering(&records) else {
            return ArchivalStep::Empty;
        };

        let archive_file = match self
            .archive_writer
            .write_archive(event_type, &period, &records)
            .await
        {
            Ok(archive_file) => archive_file,
            Err(error) => {
                return ArchivalStep::Failed(RunFailure::new(
                    event_type.clone(),
                    RunStage::Archiving,
                    error.to_string(),
                ));
            }
        };

        if let (Some(settings), Some(lease)) = (&self.lease, lease)
            && let Err(error) = settings.renew(lease).await
        {
            return ArchivalStep::ArchivedNotDeleted {
                filename: archive_file.filename,
                deleted: 0,
                failure: RunFailure::new(event_type.clone(), RunStage::Leasing, error.to_string()),
            };
        }

        let selected = records.len();
        match self.delete_archived(&records).await {
            Ok(count) => ArchivalStep::Archived {
                filename: archive_file.filename,
                count,
            },
            Err(partial) => ArchivalStep::ArchivedNotDeleted {
                filename: archive_file.filename,
                deleted: partial.deleted,
                failure: RunFailure::new(
                    event_type.clone(),
                    RunStage::Deleting,
                    format!(
                        "deleted {} of {selected} archived rows: {}",
                        partial.deleted, partial.error
                    ),
                ),
            },
        }
    }

    /// Deletes exactly the selected ids so rows inserted after selection stay.
    ///
    /// Returns the rows actually removed; ids that vanished since selection
    /// are not counted.
    async fn delete_archived(&self, records: &[AuditLogRecord]) -> Result<u64, PartialDelete> {
        let ids = records.iter().map(|record| record.id).collect::<Vec<_>>();
        let mut deleted = 0_u64;

        for chunk in ids.chunks(DELETE_CHUNK_SIZE) {
            match self.engine.repository().delete_by_ids(chunk).await {
                Ok(removed) => deleted = deleted.saturating_add(removed),
                Err(error) => return Err(PartialDelete { deleted, error }),
            }
        }

        Ok(deleted)
    }
}
