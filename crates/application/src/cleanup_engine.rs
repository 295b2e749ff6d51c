use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use freightdesk_core::AppResult;
use freightdesk_domain::{EventType, NewAuditLogRecord, RetentionAuditAction, RetentionDays};

use crate::retention_engine::RetentionEngine;
use crate::retention_lease::LeaseSettings;
use crate::retention_ports::{
    ArchivalLeaseCoordinator, AuditRecordFilter, AutomatedCleanupSummary, CleanupOutcome,
    RunFailure, RunStage,
};

#[cfg(test)]
mod tests;

/// Destructive-only deletion paths. Nothing here archives first.
#[derive(Clone)]
pub struct CleanupEngine {
    engine: RetentionEngine,
    lease: Option<LeaseSettings>,
}

impl CleanupEngine {
    /// Creates a cleanup engine over one run's engine.
    #[must_use]
    pub fn new(engine: RetentionEngine) -> Self {
        Self {
            engine,
            lease: None,
        }
    }

    /// Guards per-type deletes with the same leases archival runs use.
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

    /// Deletes rows of one type strictly older than `now - retention_days`.
    ///
    /// A held lease or a failed delete is an error; failures after the delete
    /// committed are reported alongside the deleted count.
    pub async fn cleanup_event_type(
        &self,
        event_type: &EventType,
        retention_days: RetentionDays,
    ) -> AppResult<CleanupOutcome> {
        let lease = match &self.lease {
            Some(settings) => Some(settings.acquire(event_type).await?),
            None => None,
        };

        let deleted = self.delete_event_type(event_type, retention_days).await;

        let mut errors = Vec::new();
        if let (Some(settings), Some(lease)) = (&self.lease, lease)
            && let Err(error) = settings.release(&lease).await
        {
            errors.push(RunFailure::new(
                event_type.clone(),
                RunStage::Leasing,
                error.to_string(),
            ));
        }

        let deleted = deleted?;
        self.record_purge_into(
            &mut errors,
            deleted,
            json!({
                "event_type": event_type,
                "retention_days": retention_days,
                "deleted": deleted,
            }),
        )
        .await;

        Ok(CleanupOutcome { deleted, errors })
    }

    /// Deletes rows of every type older than one global cutoff.
    ///
    /// Per-type policies are ignored; this is the explicit override path.
    pub async fn cleanup_older_than(&self, days: RetentionDays) -> AppResult<CleanupOutcome> {
        let cutoff = days.cutoff_from(self.engine.now());
        let deleted = self
            .engine
            .repository()
            .delete_records(&AuditRecordFilter::older_than(None, cutoff))
            .await?;

        let mut errors = Vec::new();
        self.record_purge_into(
            &mut errors,
            deleted,
            json!({
                "days": days,
                "deleted": deleted,
            }),
        )
        .await;

        Ok(CleanupOutcome { deleted, errors })
    }

    /// Applies each type's own window, continuing past per-type failures.
    pub async fn run_automated_cleanup(&self) -> AppResult<AutomatedCleanupSummary> {
        let started_at = self.engine.now();
        let mut deleted_by_type = BTreeMap::new();
        let mut errors = Vec::new();
        let mut total_deleted = 0_u64;

        for event_type in self.engine.event_types_in_scope().await? {
            let retention_days = self.engine.policy().retention_days_for(&event_type);

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

            match self.delete_event_type(&event_type, retention_days).await {
                Ok(deleted) => {
                    total_deleted = total_deleted.saturating_add(deleted);
                    if deleted > 0 {
                        deleted_by_type.insert(event_type.clone(), deleted);
                    }
                }
                Err(error) => errors.push(RunFailure::new(
                    event_type.clone(),
                    RunStage::Deleting,
                    error.to_string(),
                )),
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

        self.record_purge_into(
            &mut errors,
            total_deleted,
            json!({
                "total_deleted": total_deleted,
                "deleted_by_type": deleted_by_type,
            }),
        )
        .await;

        Ok(AutomatedCleanupSummary {
            total_deleted,
            deleted_by_type,
            errors,
            started_at,
            completed_at: self.engine.now(),
        })
    }

    async fn delete_event_type(
        &self,
        event_type: &EventType,
        retention_days: RetentionDays,
    ) -> AppResult<u64> {
        let cutoff = retention_days.cutoff_from(self.engine.now());
        self.engine
            .repository()
            .delete_records(&AuditRecordFilter::older_than(Some(event_type), cutoff))
            .await
    }

    async fn record_purge_into(
        &self,
        errors: &mut Vec<RunFailure>,
        deleted: u64,
        detail: serde_json::Value,
    ) {
        if let Err(error) = self.record_purge(deleted, detail).await {
            errors.push(RunFailure::new(
                EventType::system(),
                RunStage::Recording,
                error.to_string(),
            ));
        }
    }

    async fn record_purge(&self, deleted: u64, detail: serde_json::Value) -> AppResult<()> {
        if deleted == 0 {
            return Ok(());
        }

        let record = NewAuditLogRecord::new(
            EventType::system(),
            RetentionAuditAction::AuditLogsPurged.as_str(),
            None,
            Some(detail),
        )?;
        self.engine.repository().append_record(record).await?;

        Ok(())
    }
}
