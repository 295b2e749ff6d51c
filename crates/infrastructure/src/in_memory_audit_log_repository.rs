use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use freightdesk_application::{AuditLogRepository, AuditRecordFilter};
use freightdesk_core::{AppError, AppResult, Clock, SystemClock};
use freightdesk_domain::{AuditLogRecord, EventType, NewAuditLogRecord};

#[derive(Debug)]
struct AuditLogTable {
    records: BTreeMap<i64, AuditLogRecord>,
    /// Never reused, even after the highest id is deleted.
    next_id: i64,
}

/// In-memory audit log table keyed by id.
pub struct InMemoryAuditLogRepository {
    clock: Arc<dyn Clock>,
    table: RwLock<AuditLogTable>,
}

impl Default for InMemoryAuditLogRepository {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryAuditLogRepository {
    /// Creates an empty table that stamps appended rows with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            table: RwLock::new(AuditLogTable {
                records: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    fn matching<'a>(
        records: &'a BTreeMap<i64, AuditLogRecord>,
        filter: &'a AuditRecordFilter,
    ) -> impl Iterator<Item = &'a AuditLogRecord> {
        records.values().filter(|record| filter.matches(record))
    }
}

fn to_count(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLogRepository {
    async fn append_record(&self, record: NewAuditLogRecord) -> AppResult<AuditLogRecord> {
        let mut table = self.table.write().await;
        let id = table.next_id;
        table.next_id += 1;
        let stored = record.into_record(id, self.clock.now());
        table.records.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_event_types(&self) -> AppResult<Vec<EventType>> {
        let table = self.table.read().await;
        Ok(table
            .records
            .values()
            .map(|record| record.event_type.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    async fn record_counts_by_event_type(&self) -> AppResult<BTreeMap<EventType, u64>> {
        let table = self.table.read().await;
        let mut counts = BTreeMap::new();
        for record in table.records.values() {
            *counts.entry(record.event_type.clone()).or_insert(0_u64) += 1;
        }
        Ok(counts)
    }

    async fn count_records(&self, filter: &AuditRecordFilter) -> AppResult<u64> {
        let table = self.table.read().await;
        Ok(to_count(Self::matching(&table.records, filter).count()))
    }

    async fn oldest_record_at(
        &self,
        filter: &AuditRecordFilter,
    ) -> AppResult<Option<DateTime<Utc>>> {
        let table = self.table.read().await;
        Ok(Self::matching(&table.records, filter)
            .map(|record| record.created_at)
            .min())
    }

    async fn find_records(&self, filter: &AuditRecordFilter) -> AppResult<Vec<AuditLogRecord>> {
        let table = self.table.read().await;
        let mut selected = Self::matching(&table.records, filter)
            .cloned()
            .collect::<Vec<_>>();
        selected.sort_by_key(|record| (record.created_at, record.id));
        Ok(selected)
    }

    async fn delete_by_ids(&self, ids: &[i64]) -> AppResult<u64> {
        let mut table = self.table.write().await;
        Ok(to_count(
            ids.iter()
                .filter_map(|id| table.records.remove(id))
                .count(),
        ))
    }

    async fn delete_records(&self, filter: &AuditRecordFilter) -> AppResult<u64> {
        filter.require_cutoff()?;
        let mut table = self.table.write().await;
        let before = table.records.len();
        table.records.retain(|_, record| !filter.matches(record));
        Ok(to_count(before - table.records.len()))
    }

    async fn insert_records(&self, incoming: &[AuditLogRecord]) -> AppResult<u64> {
        let mut table = self.table.write().await;
        if let Some(duplicate) = incoming
            .iter()
            .find(|record| table.records.contains_key(&record.id))
        {
            return Err(AppError::Conflict(format!(
                "audit log id {} already exists",
                duplicate.id
            )));
        }

        for record in incoming {
            table.records.insert(record.id, record.clone());
            table.next_id = table.next_id.max(record.id + 1);
        }
        Ok(to_count(incoming.len()))
    }
}
