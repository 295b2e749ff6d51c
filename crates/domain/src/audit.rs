use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use freightdesk_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const EVENT_TYPE_MAX_LENGTH: usize = 64;

/// Category tag on an audit record that selects its retention policy.
///
/// Event types double as archive directory names, so only lower-case ASCII
/// letters, digits, `_`, `-` and `.` are accepted and the value may not start
/// with a dot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventType(String);

impl EventType {
    /// Event type used for records emitted by the retention pipeline itself.
    pub const SYSTEM: &'static str = "system";

    /// Creates a validated event type.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "event_type must not be empty".to_owned(),
            ));
        }

        if trimmed.len() > EVENT_TYPE_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "event_type '{trimmed}' exceeds {EVENT_TYPE_MAX_LENGTH} characters"
            )));
        }

        if trimmed.starts_with('.')
            || !trimmed.chars().all(|character| {
                character.is_ascii_lowercase()
                    || character.is_ascii_digit()
                    || matches!(character, '_' | '-' | '.')
            })
        {
            return Err(AppError::Validation(format!(
                "event_type '{trimmed}' must use lower-case letters, digits, '_', '-' or '.'"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the system event type.
    #[must_use]
    pub fn system() -> Self {
        Self(Self::SYSTEM.to_owned())
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for EventType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<String> for EventType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.0
    }
}

impl Display for EventType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Immutable fact describing one system event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogRecord {
    /// Primary key in the live table.
    pub id: i64,
    /// Category that selects the retention policy.
    pub event_type: EventType,
    /// Stable action identifier.
    pub action: String,
    /// Acting user, when the event had one.
    pub actor_id: Option<i64>,
    /// Instant the event occurred.
    pub created_at: DateTime<Utc>,
    /// Free-form event payload.
    pub additional_data: Option<Value>,
}

/// Payload for appending a new audit record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditLogRecord {
    event_type: EventType,
    action: NonEmptyString,
    actor_id: Option<i64>,
    additional_data: Option<Value>,
}

impl NewAuditLogRecord {
    /// Creates a validated append payload.
    pub fn new(
        event_type: EventType,
        action: impl Into<String>,
        actor_id: Option<i64>,
        additional_data: Option<Value>,
    ) -> AppResult<Self> {
        Ok(Self {
            event_type,
            action: NonEmptyString::new(action)?,
            actor_id,
            additional_data,
        })
    }

    /// Returns the event type.
    #[must_use]
    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    /// Returns the action identifier.
    #[must_use]
    pub fn action(&self) -> &str {
        self.action.as_str()
    }

    /// Returns the acting user, if any.
    #[must_use]
    pub fn actor_id(&self) -> Option<i64> {
        self.actor_id
    }

    /// Returns the event payload.
    #[must_use]
    pub fn additional_data(&self) -> Option<&Value> {
        self.additional_data.as_ref()
    }

    /// Materializes the payload into a stored record.
    #[must_use]
    pub fn into_record(self, id: i64, created_at: DateTime<Utc>) -> AuditLogRecord {
        AuditLogRecord {
            id,
            event_type: self.event_type,
            action: self.action.into(),
            actor_id: self.actor_id,
            created_at,
            additional_data: self.additional_data,
        }
    }
}

/// Stable actions the retention pipeline records about its own runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionAuditAction {
    /// Emitted when an event type's retention window changes.
    RetentionPolicyUpdated,
    /// Emitted after an archival run moved records into archive files.
    AuditLogsArchived,
    /// Emitted after a cleanup run deleted records.
    AuditLogsPurged,
    /// Emitted after records were restored from an archive file.
    AuditLogsRestored,
}

impl RetentionAuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetentionPolicyUpdated => "retention_policy_updated",
            Self::AuditLogsArchived => "audit_logs_archived",
            Self::AuditLogsPurged => "audit_logs_purged",
            Self::AuditLogsRestored => "audit_logs_restored",
        }
    }
}
