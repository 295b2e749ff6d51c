use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use freightdesk_core::{AppError, AppResult};
use freightdesk_domain::{
    AuditLogRecord, EventType, NewAuditLogRecord, RetentionDays, RetentionPolicy,
};

/// Row filter shared by counting, selection and deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditRecordFilter {
    /// Restricts rows to one event type.
    pub event_type: Option<EventType>,
    /// Keeps rows with `created_at < created_before`.
    pub created_before: Option<DateTime<Utc>>,
    /// Keeps rows with `created_at >= created_at_or_after`.
    pub created_at_or_after: Option<DateTime<Utc>>,
}

impl AuditRecordFilter {
    /// Matches every row of one event type.
    #[must_use]
    pub fn for_event_type(event_type: &EventType) -> Self {
        Self {
            event_type: Some(event_type.clone()),
            ..Self::default()
        }
    }

    /// Matches rows strictly older than the cutoff, optionally for one type.
    #[must_use]
    pub fn older_than(event_type: Option<&EventType>, cutoff: DateTime<Utc>) -> Self {
        Self {
            event_type: event_type.cloned(),
            created_before: Some(cutoff),
            created_at_or_after: None,
        }
    }

    /// Matches rows of one type created at or after `since`.
    #[must_use]
    pub fn created_since(event_type: &EventType, since: DateTime<Utc>) -> Self {
        Self {
            event_type: Some(event_type.clone()),
            created_before: None,
            created_at_or_after: Some(since),
        }
    }

    /// Returns whether a record matches this filter.
    #[must_use]
    pub fn matches(&self, record: &AuditLogRecord) -> bool {
        self.event_type
            .as_ref()
            .is_none_or(|event_type| &record.event_type == event_type)
            && self
                .created_before
                .is_none_or(|cutoff| record.created_at < cutoff)
            && self
                .created_at_or_after
                .is_none_or(|since| record.created_at >= since)
    }

    /// Rejects filters that would delete without a time bound.
    pub fn require_cutoff(&self) -> AppResult<DateTime<Utc>> {
        self.created_before.ok_or_else(|| {
            AppError::Validation("audit log deletion requires a created_before cutoff".to_owned())
        })
    }
}

/// Repository port for the live audit log table.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Appends one record and returns it with its assigned id and timestamp.
    async fn append_record(&self, record: NewAuditLogRecord) -> AppResult<AuditLogRecord>;

    /// Lists distinct event types that currently have rows.
    async fn list_event_types(&self) -> AppResult<Vec<EventType>>;

    /// Counts rows per event type.
    async fn record_counts_by_event_type(&self) -> AppResult<BTreeMap<EventType, u64>>;

    /// Counts rows matching the filter.
    async fn count_records(&self, filter: &AuditRecordFilter) -> AppResult<u64>;

    /// Returns the oldest timestamp matching the filter.
    async fn oldest_record_at(
        &self,
        filter: &AuditRecordFilter,
    ) -> AppResult<Option<DateTime<Utc>>>;

    /// Returns rows matching the filter ordered by timestamp then id.
    async fn find_records(&self, filter: &AuditRecordFilter) -> AppResult<Vec<AuditLogRecord>>;

    /// Deletes rows by primary key and returns the number removed.
    async fn delete_by_ids(&self, ids: &[i64]) -> AppResult<u64>;

    /// Deletes rows matching a filter that carries a `created_before` cutoff.
    async fn delete_records(&self, filter: &AuditRecordFilter) -> AppResult<u64>;

    /// Inserts rows with their original ids.
    ///
    /// Duplicate ids are not de-duplicated; adapters surface them as errors.
    async fn insert_records(&self, records: &[AuditLogRecord]) -> AppResult<u64>;
}

/// Port for the persisted `retention_policy` setting.
#[async_trait]
pub trait RetentionPolicyStore: Send + Sync {
    /// Loads the current policy, seeding defaults when nothing is stored.
    async fn load_policy(&self) -> AppResult<RetentionPolicy>;

    /// Persists one event type's window and returns the updated policy.
    async fn set_retention_days(
        &self,
        event_type: &EventType,
        days: RetentionDays,
    ) -> AppResult<RetentionPolicy>;
}
