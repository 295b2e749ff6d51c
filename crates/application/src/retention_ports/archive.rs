use async_trait::async_trait;

use freightdesk_core::AppResult;
use freightdesk_domain::{ArchiveFile, ArchivePeriod, AuditLogRecord, EventType};

/// Port for durable archive storage.
#[async_trait]
pub trait ArchiveWriter: Send + Sync {
    /// Writes one batch to `{event_type}/{period}.csv` and returns its descriptor.
    ///
    /// Existing files are never overwritten; a numeric suffix is appended to
    /// the period instead. The write is durable when this returns `Ok`.
    async fn write_archive(
        &self,
        event_type: &EventType,
        period: &ArchivePeriod,
        records: &[AuditLogRecord],
    ) -> AppResult<ArchiveFile>;

    /// Lists every archive file below the archive root.
    async fn list_archive_files(&self) -> AppResult<Vec<ArchiveFile>>;

    /// Parses one archive file back into records.
    async fn read_archive(&self, filename: &str) -> AppResult<Vec<AuditLogRecord>>;
}
