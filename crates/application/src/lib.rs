//! Application services and ports for audit retention.

#![forbid(unsafe_code)]

mod archival_orchestrator;
mod cleanup_engine;
mod retention_engine;
mod retention_lease;
mod retention_policy_service;
mod retention_ports;

#[cfg(test)]
mod test_support;

pub use archival_orchestrator::{ArchivalOrchestrator, DELETE_CHUNK_SIZE};
pub use cleanup_engine::CleanupEngine;
pub use retention_engine::{ESTIMATED_ROW_BYTES, RetentionEngine, estimated_megabytes};
pub use retention_policy_service::{RetentionPolicyService, parse_policy_assignment};
pub use retention_ports::{
    ArchivalLease, ArchivalLeaseCoordinator, ArchivalSummary, ArchiveListing, ArchivePreview,
    ArchiveWriter, AuditLogRepository, AuditRecordFilter, AutomatedCleanupSummary,
    CleanupOutcome, CleanupPreview, OptimizationReason, OptimizationReport, PolicyEntry, PolicyOverview,
    RestoreSummary, RetentionOptimization, RetentionPolicyStore, RunFailure, RunStage,
    StorageStatistics, TypeArchiveInfo, TypeCleanupInfo,
};
