use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use freightdesk_application::ArchiveWriter;
use freightdesk_core::{AppError, AppResult};
use freightdesk_domain::{ArchiveFile, ArchivePeriod, AuditLogRecord, EventType};


const ARCHIVE_EXTENSION: &str = "csv";

/// Writes archive batches as CSV files below one root directory.
///
/// Layout is `{root}/{event_type}/{period}.csv`. Files are created with
/// `create_new` and synced before the descriptor is returned, so an existing
/// archive is never overwritten and a returned file is durable.
#[derive(Debug, Clone)]
pub struct FilesystemArchiveWriter {
    root: PathBuf,
}

impl FilesystemArchiveWriter {
    /// Creates a writer rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps `event_type/period.csv` below the root, rejecting anything else.
    fn resolve(&self, filename: &str) -> AppResult<PathBuf> {
        let invalid = || {
            AppError::Validation(format!(
                "archive filename '{filename}' must have the form event_type/period.csv"
            ))
        };

        let (directory, file) = filename.split_once('/').ok_or_else(invalid)?;
        let event_type = EventType::new(directory).map_err(|_| invalid())?;
        file.strip_suffix(".csv")
            .filter(|period| is_safe_period(period))
            .ok_or_else(invalid)?;

        Ok(self.root.join(event_type.as_str()).join(file))
    }
}

fn is_safe_period(period: &str) -> bool {
    !period.is_empty()
        && !period.starts_with('.')
        && period
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '-' | '_'))
}

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveRow {
    id: i64,
    event_type: String,
    action: String,
    actor_id: Option<i64>,
    created_at: String,
    additional_data: Option<String>,
}

impl TryFrom<&AuditLogRecord> for ArchiveRow {
    type Error = AppError;

    fn try_from(record: &AuditLogRecord) -> Result<Self, Self::Error> {
        let additional_data = record
            .additional_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to encode additional_data of audit log {}: {error}",
                    record.id
                ))
            })?;

        Ok(Self {
            id: record.id,
            event_type: record.event_type.as_str().to_owned(),
            action: record.action.clone(),
            actor_id: record.actor_id,
            created_at: record.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            additional_data,
        })
    }
}

impl TryFrom<ArchiveRow> for AuditLogRecord {
    type Error = AppError;

    fn try_from(row: ArchiveRow) -> Result<Self, Self::Error> {
        let created_at = DateTime::parse_from_rfc3339(row.created_at.as_str())
            .map_err(|error| {
                AppError::Internal(format!(
                    "archived audit log {} has an invalid created_at: {error}",
                    row.id
                ))
            })?
            .with_timezone(&Utc);

        let additional_data = row
            .additional_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|error| {
                AppError::Internal(format!(
                    "archived audit log {} has invalid additional_data: {error}",
                    row.id
                ))
            })?;

        Ok(Self {
            id: row.id,
            event_type: EventType::new(row.event_type)?,
            action: row.action,
            actor_id: row.actor_id,
            created_at,
            additional_data,
        })
    }
}

fn encode_csv(records: &[AuditLogRecord]) -> AppResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer
            .serialize(ArchiveRow::try_from(record)?)
            .map_err(|error| {
                AppError::Internal(format!("failed to encode archive row {}: {error}", record.id))
            })?;
    }

    writer
        .into_inner()
        .map_err(|error| AppError::Internal(format!("failed to flush archive buffer: {error}")))
}

fn decode_csv(filename: &str, bytes: &[u8]) -> AppResult<Vec<AuditLogRecord>> {
    let mut reader = csv::Reader::from_reader(bytes);
    reader
        .deserialize::<ArchiveRow>()
        .map(|row| {
            let row = row.map_err(|error| {
                AppError::Internal(format!("failed to parse archive '{filename}': {error}"))
            })?;
            AuditLogRecord::try_from(row)
        })
        .collect()
}

async fn describe(
    event_type: EventType,
    period: String,
    path: &Path,
) -> AppResult<ArchiveFile> {
    let metadata = fs::metadata(path).await.map_err(|error| {
        AppError::Internal(format!(
            "failed to stat archive '{}': {error}",
            path.display()
        ))
    })?;
    let modified_at = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to read modification time of '{}': {error}",
                path.display()
            ))
        })?;

    Ok(ArchiveFile {
        filename: format!("{event_type}/{period}.{ARCHIVE_EXTENSION}"),
        event_type,
        period,
        size_bytes: metadata.len(),
        modified_at,
    })
}

#[async_trait]
impl ArchiveWriter for FilesystemArchiveWriter {
    async fn write_archive(
        &self,
        event_type: &EventType,
        period: &ArchivePeriod,
        records: &[AuditLogRecord],
    ) -> AppResult<ArchiveFile> {
        let contents = encode_csv(records)?;
        let directory = self.root.join(event_type.as_str());
        fs::create_dir_all(&directory).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to create archive directory '{}': {error}",
                directory.display()
            ))
        })?;

        let mut suffix = 1_u32;
        let (label, path, mut file) = loop {
            let label = if suffix == 1 {
                period.as_str().to_owned()
            } else {
                format!("{}-{suffix}", period.as_str())
            };
            let path = directory.join(format!("{label}.{ARCHIVE_EXTENSION}"));

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (label, path, file),
                Err(error) if error.kind() == ErrorKind::AlreadyExists => suffix += 1,
                Err(error) => {
                    return Err(AppError::Internal(format!(
                        "failed to create archive '{}': {error}",
                        path.display()
                    )));
                }
            }
        };

        let written = async {
            file.write_all(&contents).await?;
            file.sync_all().await
        }
        .await;

        if let Err(error) = written {
            if let Err(cleanup_error) = fs::remove_file(&path).await {
                tracing::warn!(
                    path = %path.display(),
                    error = %cleanup_error,
                    "failed to remove partial archive"
                );
            }
            return Err(AppError::Internal(format!(
                "failed to write archive '{}': {error}",
                path.display()
            )));
        }

        let archive_file = describe(event_type.clone(), label, &path).await?;
        tracing::info!(
            filename = %archive_file.filename,
            records = records.len(),
            size_bytes = archive_file.size_bytes,
            "wrote audit archive"
        );

        Ok(archive_file)
    }

    async fn list_archive_files(&self) -> AppResult<Vec<ArchiveFile>> {
        let mut directories = match fs::read_dir(&self.root).await {
            Ok(directories) => directories,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(AppError::Internal(format!(
                    "failed to read archive root '{}': {error}",
                    self.root.display()
                )));
            }
        };

        let list_error = |error: std::io::Error| {
            AppError::Internal(format!("failed to list archive files: {error}"))
        };

        let mut files = Vec::new();
        while let Some(directory) = directories.next_entry().await.map_err(list_error)? {
            let Some(event_type) = directory
                .file_name()
                .to_str()
                .and_then(|name| EventType::new(name).ok())
            else {
                continue;
            };
            if !directory.file_type().await.map_err(list_error)?.is_dir() {
                continue;
            }

            let mut entries = fs::read_dir(directory.path()).await.map_err(list_error)?;
            while let Some(entry) = entries.next_entry().await.map_err(list_error)? {
                let path = entry.path();
                let Some(period) = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(|name| name.strip_suffix(".csv"))
                    .filter(|period| is_safe_period(period))
                else {
                    continue;
                };

                files.push(describe(event_type.clone(), period.to_owned(), &path).await?);
            }
        }

        tracing::debug!(count = files.len(), root = %self.root.display(), "listed audit archives");
        Ok(files)
    }

    async fn read_archive(&self, filename: &str) -> AppResult<Vec<AuditLogRecord>> {
        let path = self.resolve(filename)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!(
                    "archive file '{filename}' not found"
                )));
            }
            Err(error) => {
                return Err(AppError::Internal(format!(
                    "failed to read archive '{filename}': {error}"
                )));
            }
        };

        let records = decode_csv(filename, &bytes)?;
        tracing::debug!(filename, records = records.len(), "read audit archive");
        Ok(records)
    }
}
