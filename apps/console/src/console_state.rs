use std::sync::Arc;

use sqlx::PgPool;
use tracing::debug;

use freightdesk_application::{
    ArchivalLeaseCoordinator, ArchivalOrchestrator, ArchiveWriter, AuditLogRepository,
    CleanupEngine, RetentionEngine, RetentionPolicyService, RetentionPolicyStore,
};
use freightdesk_core::{AppResult, Clock, SystemClock};
use freightdesk_infrastructure::{
    FilesystemArchiveWriter, PostgresAuditLogRepository, PostgresRetentionPolicyStore,
    shared_lease_coordinator,
};

use crate::console_config::ConsoleConfig;

/// Adapters shared by every console command.
#[derive(Clone)]
pub struct ConsoleState {
    audit_repository: Arc<dyn AuditLogRepository>,
    policy_store: Arc<dyn RetentionPolicyStore>,
    archive_writer: Arc<dyn ArchiveWriter>,
    lease_coordinator: Arc<dyn ArchivalLeaseCoordinator>,
    clock: Arc<dyn Clock>,
    holder_id: String,
    lease_seconds: u32,
}

impl ConsoleState {
    pub fn new(
        audit_repository: Arc<dyn AuditLogRepository>,
        policy_store: Arc<dyn RetentionPolicyStore>,
        archive_writer: Arc<dyn ArchiveWriter>,
        lease_coordinator: Arc<dyn ArchivalLeaseCoordinator>,
        clock: Arc<dyn Clock>,
        holder_id: impl Into<String>,
        lease_seconds: u32,
    ) -> Self {
        Self {
            audit_repository,
            policy_store,
            archive_writer,
            lease_coordinator,
            clock,
            holder_id: holder_id.into(),
            lease_seconds,
        }
    }

    /// Wires the PostgreSQL, filesystem and lease adapters from configuration.
    pub fn from_config(config: &ConsoleConfig, pool: PgPool) -> AppResult<Self> {
        let (lease_coordinator, lease_backend) =
            shared_lease_coordinator(config.redis_url.as_deref(), pool.clone())?;
        debug!(
            holder_id = %config.holder_id,
            lease_backend,
            "console lease coordinator selected"
        );

        Ok(Self::new(
            Arc::new(PostgresAuditLogRepository::new(pool.clone())),
            Arc::new(PostgresRetentionPolicyStore::new(
                pool,
                config.default_retention_days,
            )),
            Arc::new(FilesystemArchiveWriter::new(config.archive_dir.as_str())),
            lease_coordinator,
            Arc::new(SystemClock),
            config.holder_id.as_str(),
            config.lease_seconds,
        ))
    }

    pub fn policy_service(&self) -> RetentionPolicyService {
        RetentionPolicyService::new(self.policy_store.clone(), self.audit_repository.clone())
    }

    /// Builds an engine over the currently stored policy, pinned to one `now`.
    pub async fn engine(&self) -> AppResult<RetentionEngine> {
        let policy = self.policy_store.load_policy().await?;
        let engine =
            RetentionEngine::new(self.audit_repository.clone(), policy, self.clock.clone());
        Ok(engine.pinned())
    }

    pub fn orchestrator(&self, engine: RetentionEngine) -> ArchivalOrchestrator {
        ArchivalOrchestrator::new(engine, self.archive_writer.clone()).with_lease_coordinator(
            self.lease_coordinator.clone(),
            self.holder_id.as_str(),
            self.lease_seconds,
        )
    }

    pub fn cleanup_engine(&self, engine: RetentionEngine) -> CleanupEngine {
        CleanupEngine::new(engine).with_lease_coordinator(
            self.lease_coordinator.clone(),
            self.holder_id.as_str(),
            self.lease_seconds,
        )
    }
}
