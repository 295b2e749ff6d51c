//! Freightdesk audit retention worker runtime.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use freightdesk_application::{
    ArchivalLeaseCoordinator, ArchivalOrchestrator, CleanupEngine, RetentionEngine,
    RetentionPolicyStore, RunFailure,
};
use freightdesk_core::env::{optional_env, parse_env, required_env};
use freightdesk_core::{AppError, AppResult, SystemClock};
use freightdesk_domain::{DEFAULT_RETENTION_DAYS, RetentionDays};
use freightdesk_infrastructure::{
    FilesystemArchiveWriter, PostgresAuditLogRepository, PostgresRetentionPolicyStore,
    shared_lease_coordinator,
};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    archive_dir: String,
    redis_url: Option<String>,
    worker_id: String,
    lease_seconds: u32,
    default_retention_days: RetentionDays,
    interval_seconds: u64,
}

struct RetentionRuntime {
    audit_repository: Arc<PostgresAuditLogRepository>,
    policy_store: Arc<PostgresRetentionPolicyStore>,
    archive_writer: Arc<FilesystemArchiveWriter>,
    lease_coordinator: Arc<dyn ArchivalLeaseCoordinator>,
    lease_backend: &'static str,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let runtime = RetentionRuntime::build(&config, pool)?;

    info!(
        worker_id = %config.worker_id,
        archive_dir = %config.archive_dir,
        lease_backend = runtime.lease_backend,
        lease_seconds = config.lease_seconds,
        interval_seconds = config.interval_seconds,
        "freightdesk-worker started"
    );

    loop {
        if let Err(error) = runtime.run_once(&config).await {
            warn!(
                worker_id = %config.worker_id,
                error = %error,
                "audit retention run failed"
            );
        }

        tokio::time::sleep(Duration::from_secs(config.interval_seconds)).await;
    }
}

impl RetentionRuntime {
    fn build(config: &WorkerConfig, pool: PgPool) -> AppResult<Self> {
        let (lease_coordinator, lease_backend) =
            shared_lease_coordinator(config.redis_url.as_deref(), pool.clone())?;

        Ok(Self {
            audit_repository: Arc::new(PostgresAuditLogRepository::new(pool.clone())),
            policy_store: Arc::new(PostgresRetentionPolicyStore::new(
                pool,
                config.default_retention_days,
            )),
            archive_writer: Arc::new(FilesystemArchiveWriter::new(config.archive_dir.as_str())),
            lease_coordinator,
            lease_backend,
        })
    }

    /// Archives every type past its threshold, then purges only if archival was clean.
    ///
    /// Both passes share one pinned `now`.
    async fn run_once(&self, config: &WorkerConfig) -> AppResult<()> {
        let policy = self.policy_store.load_policy().await?;
        let engine = RetentionEngine::new(
            self.audit_repository.clone(),
            policy,
            Arc::new(SystemClock),
        )
        .pinned();

        let archival = ArchivalOrchestrator::new(engine.clone(), self.archive_writer.clone())
            .with_lease_coordinator(
                self.lease_coordinator.clone(),
                config.worker_id.as_str(),
                config.lease_seconds,
            )
            .archive_old_logs(None)
            .await?;

        info!(
            worker_id = %config.worker_id,
            total_archived = archival.total_archived,
            archive_files = archival.archive_files.len(),
            failed_types = archival.errors.len(),
            "audit archival run completed"
        );
        log_failures(config, "archival", &archival.errors);

        if archival.has_errors() {
            warn!(
                worker_id = %config.worker_id,
                "skipping automated cleanup after archival errors"
            );
            return Ok(());
        }

        let cleanup = CleanupEngine::new(engine)
            .with_lease_coordinator(
                self.lease_coordinator.clone(),
                config.worker_id.as_str(),
                config.lease_seconds,
            )
            .run_automated_cleanup()
            .await?;

        info!(
            worker_id = %config.worker_id,
            total_deleted = cleanup.total_deleted,
            failed_types = cleanup.errors.len(),
            "audit cleanup run completed"
        );
        log_failures(config, "cleanup", &cleanup.errors);

        Ok(())
    }
}

fn log_failures(config: &WorkerConfig, run: &str, failures: &[RunFailure]) {
    for failure in failures {
        warn!(
            worker_id = %config.worker_id,
            run,
            event_type = %failure.event_type,
            stage = failure.stage.as_str(),
            error = %failure.message,
            "audit retention step failed"
        );
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let archive_dir = optional_env("AUDIT_ARCHIVE_DIR")
            .unwrap_or_else(|| "storage/app/audit-archives".to_owned());
        let redis_url = optional_env("REDIS_URL");
        let worker_id =
            optional_env("WORKER_ID").unwrap_or_else(|| format!("worker-{}", std::process::id()));
        let lease_seconds = parse_env("AUDIT_LEASE_SECONDS", 900_u32)?;
        let default_retention_days =
            parse_env("AUDIT_DEFAULT_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;
        let interval_seconds = parse_env("AUDIT_WORKER_INTERVAL_SECONDS", 86_400_u64)?;

        if lease_seconds == 0 {
            return Err(AppError::Validation(
                "AUDIT_LEASE_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if interval_seconds == 0 {
            return Err(AppError::Validation(
                "AUDIT_WORKER_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            archive_dir,
            redis_url,
            worker_id,
            lease_seconds,
            default_retention_days: RetentionDays::new(default_retention_days)?,
            interval_seconds,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
