use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use freightdesk_core::{AppResult, Clock, FixedClock};
use freightdesk_domain::{
    AuditLogRecord, EventType, RetentionDays, RetentionPolicy, bytes_to_megabytes,
};

use crate::retention_ports::{
    ArchivePreview, AuditLogRepository, AuditRecordFilter, CleanupPreview, StorageStatistics,
    TypeArchiveInfo, TypeCleanupInfo,
};

mod optimization;


/// Fixed average row size used for storage estimates.
pub const ESTIMATED_ROW_BYTES: u64 = 1024;

/// Read-only retention analysis over the live audit table.
///
/// The policy is loaded once by the caller and injected here, so every
/// computation in one run sees the same windows and the same clock.
#[derive(Clone)]
pub struct RetentionEngine {
    repository: Arc<dyn AuditLogRepository>,
    policy: RetentionPolicy,
    clock: Arc<dyn Clock>,
}

impl RetentionEngine {
    /// Creates an engine for one run.
    #[must_use]
    pub fn new(
        repository: Arc<dyn AuditLogRepository>,
        policy: RetentionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            policy,
            clock,
        }
    }

    /// Returns a copy whose clock is frozen at the current instant.
    ///
    /// Archival and cleanup built from the pinned engine compute their
    /// thresholds and cutoffs from one `now`, so a record cannot cross the
    /// retention boundary between the two passes.
    #[must_use]
    pub fn pinned(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            policy: self.policy.clone(),
            clock: Arc::new(FixedClock::new(self.clock.now())),
        }
    }

    /// Returns a copy over another policy that keeps this engine's clock.
    #[must_use]
    pub fn with_policy(&self, policy: RetentionPolicy) -> Self {
        Self {
            repository: self.repository.clone(),
            policy,
            clock: self.clock.clone(),
        }
    }

    /// Returns the policy this engine was built with.
    #[must_use]
    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Returns the current instant from the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn repository(&self) -> &Arc<dyn AuditLogRepository> {
        &self.repository
    }

    /// Lists event types that have rows or an explicit policy, sorted.
    pub async fn event_types_in_scope(&self) -> AppResult<Vec<EventType>> {
        let mut event_types = self
            .repository
            .list_event_types()
            .await?
            .into_iter()
            .collect::<BTreeSet<_>>();
        event_types.extend(self.policy.entries().keys().cloned());

        Ok(event_types.into_iter().collect())
    }

    /// Resolves the archive threshold for one type, honoring an override.
    #[must_use]
    pub fn archive_threshold_for(
        &self,
        event_type: &EventType,
        days_override: Option<RetentionDays>,
    ) -> RetentionDays {
        days_override.unwrap_or_else(|| {
            self.policy
                .retention_days_for(event_type)
                .archive_threshold()
        })
    }

    /// Counts, per event type, rows strictly older than `now - retention_days`.
    pub async fn preview_cleanup(&self) -> AppResult<CleanupPreview> {
        let now = self.now();
        let mut by_event_type = BTreeMap::new();
        let mut total_to_delete = 0_u64;

        for event_type in self.event_types_in_scope().await? {
            let retention_days = self.policy.retention_days_for(&event_type);
            let cutoff_date = retention_days.cutoff_from(now);
            let count = self
                .repository
                .count_records(&AuditRecordFilter::older_than(
                    Some(&event_type),
                    cutoff_date,
                ))
                .await?;
            let oldest_record = self
                .repository
                .oldest_record_at(&AuditRecordFilter::for_event_type(&event_type))
                .await?;

            total_to_delete = total_to_delete.saturating_add(count);
            by_event_type.insert(
                event_type,
                TypeCleanupInfo {
                    count,
                    retention_days,
                    cutoff_date,
                    oldest_record,
                },
            );
        }

        Ok(CleanupPreview {
            total_to_delete,
            by_event_type,
            generated_at: now,
        })
    }

    /// Counts, per event type, rows an archival run would move.
    pub async fn preview_archive(
        &self,
        days_override: Option<RetentionDays>,
    ) -> AppResult<ArchivePreview> {
        let now = self.now();
        let mut by_event_type = BTreeMap::new();
        let mut total_to_archive = 0_u64;

        for event_type in self.event_types_in_scope().await? {
            let threshold_days = self.archive_threshold_for(&event_type, days_override);
            let cutoff_date = threshold_days.cutoff_from(now);
            let count = self
                .repository
                .count_records(&AuditRecordFilter::older_than(
                    Some(&event_type),
                    cutoff_date,
                ))
                .await?;

            total_to_archive = total_to_archive.saturating_add(count);
            by_event_type.insert(
                event_type,
                TypeArchiveInfo {
                    count,
                    threshold_days,
                    cutoff_date,
                },
            );
        }

        Ok(ArchivePreview {
            total_to_archive,
            by_event_type,
        })
    }

    /// Returns row counts and a size estimate for the live table.
    pub async fn storage_statistics(&self) -> AppResult<StorageStatistics> {
        let records_by_type = self.repository.record_counts_by_event_type().await?;
        let total_records = records_by_type
            .values()
            .fold(0_u64, |total, count| total.saturating_add(*count));

        Ok(StorageStatistics {
            total_records,
            estimated_storage_mb: estimated_megabytes(total_records),
            records_by_type,
        })
    }

    /// Selects the rows of one type strictly older than `now - threshold`.
    pub async fn archive_candidates(
        &self,
        event_type: &EventType,
        threshold: RetentionDays,
    ) -> AppResult<Vec<AuditLogRecord>> {
        let cutoff = threshold.cutoff_from(self.now());
        self.repository
            .find_records(&AuditRecordFilter::older_than(Some(event_type), cutoff))
            .await
    }
}

/// Estimates storage for a row count using the fixed row size.
#[must_use]
pub fn estimated_megabytes(row_count: u64) -> f64 {
    bytes_to_megabytes(row_count.saturating_mul(ESTIMATED_ROW_BYTES))
}
