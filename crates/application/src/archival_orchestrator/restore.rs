use std::collections::BTreeMap;

use serde_json::json;

use freightdesk_core::AppResult;
use freightdesk_domain::{AuditLogRecord, EventType, NewAuditLogRecord, RetentionAuditAction};

use crate::retention_ports::{RestoreSummary, RunFailure, RunStage};

use super::ArchivalOrchestrator;

impl ArchivalOrchestrator {
    /// Re-inserts the rows of one archive file into the live table.
    ///
    /// Rows keep their original ids. Nothing is de-duplicated: restoring a
    /// file twice, or restoring rows that were never deleted, fails with
    /// duplicate keys for the affected event type. A missing file is returned
    /// as an error before anything is inserted.
    pub async fn restore_from_archive(&self, filename: &str) -> AppResult<RestoreSummary> {
        let records = self.archive_writer.read_archive(filename).await?;

        let mut batches: BTreeMap<EventType, Vec<AuditLogRecord>> = BTreeMap::new();
        for record in records {
            batches
                .entry(record.event_type.clone())
                .or_default()
                .push(record);
        }

        let mut restored_by_type = BTreeMap::new();
        let mut errors = Vec::new();
        let mut total_restored = 0_u64;

        for (event_type, batch) in batches {
            match self.engine.repository().insert_records(&batch).await {
                Ok(inserted) => {
                    total_restored = total_restored.saturating_add(inserted);
                    restored_by_type.insert(event_type, inserted);
                }
                Err(error) => errors.push(RunFailure::new(
                    event_type,
                    RunStage::Restoring,
                    error.to_string(),
                )),
            }
        }

        if total_restored > 0 {
            let record = NewAuditLogRecord::new(
                EventType::system(),
                RetentionAuditAction::AuditLogsRestored.as_str(),
                None,
                Some(json!({
                    "filename": filename,
                    "total_restored": total_restored,
                    "restored_by_type": restored_by_type,
                })),
            )?;
            if let Err(error) = self.engine.repository().append_record(record).await {
                errors.push(RunFailure::new(
                    EventType::system(),
                    RunStage::Recording,
                    error.to_string(),
                ));
            }
        }

        Ok(RestoreSummary {
            filename: filename.to_owned(),
            total_restored,
            restored_by_type,
            errors,
        })
    }
}
