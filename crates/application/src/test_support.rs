use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use tokio::sync::Mutex;

use freightdesk_core::{AppError, AppResult, Clock, FixedClock};
use freightdesk_domain::{
    ArchiveFile, ArchivePeriod, AuditLogRecord, EventType, NewAuditLogRecord, RetentionDays,
    RetentionPolicy,
};

use crate::retention_ports::{
    ArchivalLease, ArchivalLeaseCoordinator, ArchiveWriter, AuditLogRepository,
    AuditRecordFilter, RetentionPolicyStore,
};

pub(crate) fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("valid test instant"))
}

pub(crate) fn event_type(value: &str) -> EventType {
    EventType::new(value).unwrap_or_else(|error| panic!("invalid test event type: {error}"))
}

pub(crate) fn days(value: u16) -> RetentionDays {
    RetentionDays::new(value).unwrap_or_else(|error| panic!("invalid test days: {error}"))
}

pub(crate) fn policy(default_days: u16, entries: &[(&str, u16)]) -> RetentionPolicy {
    let mut policy = RetentionPolicy::new(days(default_days));
    for (name, value) in entries {
        policy.set(event_type(name), days(*value));
    }
    policy
}

pub(crate) struct FakeAuditLogRepository {
    clock: FixedClock,
    records: Mutex<Vec<AuditLogRecord>>,
    next_id: Mutex<i64>,
    failing_deletes: Mutex<HashSet<EventType>>,
    failing_appends: Mutex<bool>,
    delete_calls_left: Mutex<Option<usize>>,
}

impl FakeAuditLogRepository {
    pub(crate) fn new(clock: FixedClock) -> Self {
        Self {
            clock,
            records: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
            failing_deletes: Mutex::new(HashSet::new()),
            failing_appends: Mutex::new(false),
            delete_calls_left: Mutex::new(None),
        }
    }

    pub(crate) async fn seed(&self, name: &str, age: Duration) -> i64 {
        let mut next_id = self.next_id.lock().await;
        let id = *next_id;
        *next_id += 1;

        self.records.lock().await.push(AuditLogRecord {
            id,
            event_type: event_type(name),
            action: "seeded".to_owned(),
            actor_id: Some(42),
            created_at: self.clock.now() - age,
            additional_data: Some(json!({ "seed": id })),
        });
        id
    }

    pub(crate) async fn seed_many(&self, name: &str, age: Duration, count: usize) {
        for _ in 0..count {
            self.seed(name, age).await;
        }
    }

    pub(crate) async fn fail_deletes_for(&self, name: &str) {
        self.failing_deletes.lock().await.insert(event_type(name));
    }

    pub(crate) async fn fail_appends(&self) {
        *self.failing_appends.lock().await = true;
    }

    /// Lets `calls` id-based deletes succeed, then fails every later one.
    pub(crate) async fn fail_deletes_after(&self, calls: usize) {
        *self.delete_calls_left.lock().await = Some(calls);
    }

    pub(crate) async fn ids_of(&self, name: &str) -> Vec<i64> {
        let wanted = event_type(name);
        self.records
            .lock()
            .await
            .iter()
            .filter(|record| record.event_type == wanted)
            .map(|record| record.id)
            .collect()
    }

    pub(crate) async fn records_of(&self, name: &str) -> Vec<AuditLogRecord> {
        let wanted = event_type(name);
        self.records
            .lock()
            .await
            .iter()
            .filter(|record| record.event_type == wanted)
            .cloned()
            .collect()
    }

    async fn ensure_deletable(&self, event_types: impl Iterator<Item = EventType>) -> AppResult<()> {
        let failing = self.failing_deletes.lock().await;
        for event_type in event_types {
            if failing.contains(&event_type) {
                return Err(AppError::Internal(format!(
                    "simulated delete failure for '{event_type}'"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AuditLogRepository for FakeAuditLogRepository {
    async fn append_record(&self, record: NewAuditLogRecord) -> AppResult<AuditLogRecord> {
        if *self.failing_appends.lock().await {
            return Err(AppError::Internal("simulated append failure".to_owned()));
        }

        let mut next_id = self.next_id.lock().await;
        let stored = record.into_record(*next_id, self.clock.now());
        *next_id += 1;
        self.records.lock().await.push(stored.clone());
        Ok(stored)
    }

    async fn list_event_types(&self) -> AppResult<Vec<EventType>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .map(|record| record.event_type.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    async fn record_counts_by_event_type(&self) -> AppResult<BTreeMap<EventType, u64>> {
        let mut counts = BTreeMap::new();
        for record in self.records.lock().await.iter() {
            *counts.entry(record.event_type.clone()).or_insert(0_u64) += 1;
        }
        Ok(counts)
    }

    async fn count_records(&self, filter: &AuditRecordFilter) -> AppResult<u64> {
        let count = self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| filter.matches(record))
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn oldest_record_at(
        &self,
        filter: &AuditRecordFilter,
    ) -> AppResult<Option<DateTime<Utc>>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| filter.matches(record))
            .map(|record| record.created_at)
            .min())
    }

    async fn find_records(&self, filter: &AuditRecordFilter) -> AppResult<Vec<AuditLogRecord>> {
        let mut records = self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect::<Vec<_>>();
        records.sort_by_key(|record| (record.created_at, record.id));
        Ok(records)
    }

    async fn delete_by_ids(&self, ids: &[i64]) -> AppResult<u64> {
        if let Some(calls_left) = self.delete_calls_left.lock().await.as_mut() {
            if *calls_left == 0 {
                return Err(AppError::Internal("simulated chunk delete failure".to_owned()));
            }
            *calls_left -= 1;
        }

        let wanted = ids.iter().copied().collect::<HashSet<_>>();
        let affected = self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| wanted.contains(&record.id))
            .map(|record| record.event_type.clone())
            .collect::<Vec<_>>();
        self.ensure_deletable(affected.into_iter()).await?;

        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|record| !wanted.contains(&record.id));
        Ok(u64::try_from(before - records.len()).unwrap_or(u64::MAX))
    }

    async fn delete_records(&self, filter: &AuditRecordFilter) -> AppResult<u64> {
        filter.require_cutoff()?;
        let affected = self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| filter.matches(record))
            .map(|record| record.event_type.clone())
            .collect::<Vec<_>>();
        self.ensure_deletable(affected.into_iter()).await?;

        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|record| !filter.matches(record));
        Ok(u64::try_from(before - records.len()).unwrap_or(u64::MAX))
    }

    async fn insert_records(&self, incoming: &[AuditLogRecord]) -> AppResult<u64> {
        let mut records = self.records.lock().await;
        let existing = records.iter().map(|record| record.id).collect::<HashSet<_>>();
        if let Some(duplicate) = incoming.iter().find(|record| existing.contains(&record.id)) {
            return Err(AppError::Conflict(format!(
                "audit log id {} already exists",
                duplicate.id
            )));
        }
        records.extend(incoming.iter().cloned());
        Ok(u64::try_from(incoming.len()).unwrap_or(u64::MAX))
    }
}

pub(crate) struct FakeArchiveWriter {
    clock: FixedClock,
    files: Mutex<BTreeMap<String, (ArchiveFile, Vec<AuditLogRecord>)>>,
    failing_writes: Mutex<HashSet<EventType>>,
}

impl FakeArchiveWriter {
    pub(crate) fn new(clock: FixedClock) -> Self {
        Self {
            clock,
            files: Mutex::new(BTreeMap::new()),
            failing_writes: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) async fn fail_writes_for(&self, name: &str) {
        self.failing_writes.lock().await.insert(event_type(name));
    }

    pub(crate) async fn archived_ids(&self, filename: &str) -> Vec<i64> {
        self.files
            .lock()
            .await
            .get(filename)
            .map(|(_, records)| records.iter().map(|record| record.id).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ArchiveWriter for FakeArchiveWriter {
    async fn write_archive(
        &self,
        event_type: &EventType,
        period: &ArchivePeriod,
        records: &[AuditLogRecord],
    ) -> AppResult<ArchiveFile> {
        if self.failing_writes.lock().await.contains(event_type) {
            return Err(AppError::Internal(format!(
                "simulated archive write failure for '{event_type}'"
            )));
        }

        let mut files = self.files.lock().await;
        let mut label = period.as_str().to_owned();
        let mut suffix = 1;
        while files.contains_key(&format!("{event_type}/{label}.csv")) {
            suffix += 1;
            label = format!("{}-{suffix}", period.as_str());
        }

        let file = ArchiveFile {
            filename: format!("{event_type}/{label}.csv"),
            event_type: event_type.clone(),
            period: label,
            size_bytes: u64::try_from(records.len() * 100).unwrap_or(u64::MAX),
            modified_at: self.clock.now(),
        };
        files.insert(file.filename.clone(), (file.clone(), records.to_vec()));
        Ok(file)
    }

    async fn list_archive_files(&self) -> AppResult<Vec<ArchiveFile>> {
        Ok(self
            .files
            .lock()
            .await
            .values()
            .rev()
            .map(|(file, _)| file.clone())
            .collect())
    }

    async fn read_archive(&self, filename: &str) -> AppResult<Vec<AuditLogRecord>> {
        self.files
            .lock()
            .await
            .get(filename)
            .map(|(_, records)| records.clone())
            .ok_or_else(|| AppError::NotFound(format!("archive file '{filename}' not found")))
    }
}

#[derive(Default)]
pub(crate) struct FakeLeaseCoordinator {
    held: Mutex<HashMap<String, String>>,
    failing_releases: Mutex<bool>,
    denied_renewals: Mutex<bool>,
}

impl FakeLeaseCoordinator {
    pub(crate) async fn hold(&self, scope_key: &str) {
        self.held
            .lock()
            .await
            .insert(scope_key.to_owned(), "other-holder".to_owned());
    }

    /// Reports every renewal as lost, as if the TTL had run out mid-run.
    pub(crate) async fn deny_renewals(&self) {
        *self.denied_renewals.lock().await = true;
    }

    pub(crate) async fn fail_releases(&self) {
        *self.failing_releases.lock().await = true;
    }

    pub(crate) async fn is_held(&self, scope_key: &str) -> bool {
        self.held.lock().await.contains_key(scope_key)
    }
}

#[async_trait]
impl ArchivalLeaseCoordinator for FakeLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        _lease_seconds: u32,
    ) -> AppResult<Option<ArchivalLease>> {
        let mut held = self.held.lock().await;
        if held.contains_key(scope_key) {
            return Ok(None);
        }

        let token = format!("{holder_id}:{}", held.len());
        held.insert(scope_key.to_owned(), token.clone());
        Ok(Some(ArchivalLease {
            scope_key: scope_key.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn renew_lease(&self, lease: &ArchivalLease, _lease_seconds: u32) -> AppResult<bool> {
        if *self.denied_renewals.lock().await {
            return Ok(false);
        }

        Ok(self.held.lock().await.get(&lease.scope_key) == Some(&lease.token))
    }

    async fn release_lease(&self, lease: &ArchivalLease) -> AppResult<()> {
        if *self.failing_releases.lock().await {
            return Err(AppError::Internal("simulated lease release failure".to_owned()));
        }

        let mut held = self.held.lock().await;
        if held.get(&lease.scope_key) == Some(&lease.token) {
            held.remove(&lease.scope_key);
        }
        Ok(())
    }
}

pub(crate) struct FakeRetentionPolicyStore {
    policy: Mutex<RetentionPolicy>,
}

impl FakeRetentionPolicyStore {
    pub(crate) fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy: Mutex::new(policy),
        }
    }
}

#[async_trait]
impl RetentionPolicyStore for FakeRetentionPolicyStore {
    async fn load_policy(&self) -> AppResult<RetentionPolicy> {
        Ok(self.policy.lock().await.clone())
    }

    async fn set_retention_days(
        &self,
        event_type: &EventType,
        days: RetentionDays,
    ) -> AppResult<RetentionPolicy> {
        let mut policy = self.policy.lock().await;
        policy.set(event_type.clone(), days);
        Ok(policy.clone())
    }
}

/// Shared wiring for service tests.
pub(crate) struct Fixture {
    pub(crate) clock: FixedClock,
    pub(crate) repository: Arc<FakeAuditLogRepository>,
    pub(crate) archive_writer: Arc<FakeArchiveWriter>,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let clock = FixedClock::new(test_now());
        Self {
            repository: Arc::new(FakeAuditLogRepository::new(clock.clone())),
            archive_writer: Arc::new(FakeArchiveWriter::new(clock.clone())),
            clock,
        }
    }

    pub(crate) fn engine(&self, policy: RetentionPolicy) -> crate::RetentionEngine {
        crate::RetentionEngine::new(
            self.repository.clone(),
            policy,
            Arc::new(self.clock.clone()),
        )
    }

    pub(crate) fn orchestrator(&self, policy: RetentionPolicy) -> crate::ArchivalOrchestrator {
        crate::ArchivalOrchestrator::new(self.engine(policy), self.archive_writer.clone())
    }
}
