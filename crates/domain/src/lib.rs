//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod archive;
mod audit;
mod retention;

pub use archive::{ArchiveFile, ArchivePeriod, bytes_to_megabytes};
pub use audit::{AuditLogRecord, EventType, NewAuditLogRecord, RetentionAuditAction};
pub use retention::{
    ARCHIVE_LEAD_DAYS, COMPLIANCE_EVENT_TYPES, DEFAULT_RETENTION_DAYS,
    MIN_ARCHIVE_THRESHOLD_DAYS, RetentionDays, RetentionPolicy, is_compliance_event_type,
    is_past_cutoff,
};
