use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditLogRecord, EventType};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Date range covered by one archive batch, rendered as `YYYY-MM-DD_YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchivePeriod(String);

impl ArchivePeriod {
    /// Derives the period from the oldest and newest record in a batch.
    ///
    /// Returns `None` for an empty batch.
    #[must_use]
    pub fn covering(records: &[AuditLogRecord]) -> Option<Self> {
        let oldest = records.iter().map(|record| record.created_at).min()?;
        let newest = records.iter().map(|record| record.created_at).max()?;

        Some(Self(format!(
            "{}_{}",
            oldest.format("%Y-%m-%d"),
            newest.format("%Y-%m-%d")
        )))
    }

    /// Wraps an already rendered period label.
    #[must_use]
    pub fn from_label(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Returns the rendered label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Descriptor of one durable archive artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFile {
    /// Path relative to the archive root, `{event_type}/{period}.csv`.
    pub filename: String,
    /// Event type stored in the file.
    pub event_type: EventType,
    /// Period label, including any collision suffix.
    pub period: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

impl ArchiveFile {
    /// Returns the file size in megabytes, rounded to two decimals.
    #[must_use]
    pub fn size_mb(&self) -> f64 {
        bytes_to_megabytes(self.size_bytes)
    }
}

/// Converts a byte count to megabytes rounded to two decimals.
#[must_use]
pub fn bytes_to_megabytes(bytes: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let megabytes = bytes as f64 / BYTES_PER_MEGABYTE;
    (megabytes * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn record(id: i64, days_ago: i64) -> AuditLogRecord {
        let now = Utc
            .with_ymd_and_hms(2026, 5, 20, 8, 30, 0)
            .single()
            .unwrap_or_else(|| panic!("valid instant"));
        AuditLogRecord {
            id,
            event_type: EventType::new("security").unwrap_or_else(|_| panic!("valid type")),
            action: "login_failed".to_owned(),
            actor_id: Some(7),
            created_at: now - Duration::days(days_ago),
            additional_data: None,
        }
    }

    #[test]
    fn period_spans_oldest_to_newest() {
        let records = vec![record(1, 10), record(2, 40), record(3, 25)];
        let period = ArchivePeriod::covering(&records);
        assert_eq!(
            period.map(|value| value.as_str().to_owned()),
            Some("2026-04-10_2026-05-10".to_owned())
        );
    }

    #[test]
    fn empty_batch_has_no_period() {
        assert!(ArchivePeriod::covering(&[]).is_none());
    }

    #[test]
    fn megabytes_are_rounded() {
        assert!((bytes_to_megabytes(1_572_864) - 1.5).abs() < f64::EPSILON);
        assert!((bytes_to_megabytes(0)).abs() < f64::EPSILON);
    }
}
