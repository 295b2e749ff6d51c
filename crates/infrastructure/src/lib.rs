//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod filesystem_archive_writer;
mod in_memory_archival_lease_coordinator;
mod in_memory_audit_log_repository;
mod in_memory_retention_policy_store;
mod lease_backend;
mod postgres_advisory_lease_coordinator;
mod postgres_audit_log_repository;
mod postgres_retention_policy_store;
mod redis_archival_lease_coordinator;

pub use filesystem_archive_writer::FilesystemArchiveWriter;
pub use in_memory_archival_lease_coordinator::InMemoryArchivalLeaseCoordinator;
pub use in_memory_audit_log_repository::InMemoryAuditLogRepository;
pub use in_memory_retention_policy_store::InMemoryRetentionPolicyStore;
pub use lease_backend::{LEASE_KEY_PREFIX, shared_lease_coordinator};
pub use postgres_advisory_lease_coordinator::PostgresAdvisoryLeaseCoordinator;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_retention_policy_store::{
    PostgresRetentionPolicyStore, RETENTION_POLICY_SETTING_KEY,
};
pub use redis_archival_lease_coordinator::RedisArchivalLeaseCoordinator;

/// Embedded migrations for the audit retention schema.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
