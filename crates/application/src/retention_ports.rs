mod archive;
mod lease;
mod repository;
mod results;

pub use archive::ArchiveWriter;
pub use lease::{ArchivalLease, ArchivalLeaseCoordinator};
pub use repository::{AuditLogRepository, AuditRecordFilter, RetentionPolicyStore};
pub use results::{
    ArchivalSummary, ArchiveListing, ArchivePreview, AutomatedCleanupSummary, CleanupOutcome,
    CleanupPreview, OptimizationReason, OptimizationReport, PolicyEntry, PolicyOverview, RestoreSummary,
    RetentionOptimization, RunFailure, RunStage, StorageStatistics, TypeArchiveInfo,
    TypeCleanupInfo,
};
