use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, Utc};
use freightdesk_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::audit::EventType;

/// Earliest point, in days, at which records are moved to an archive.
pub const MIN_ARCHIVE_THRESHOLD_DAYS: u16 = 30;

/// Lead time, in days, between archival and deletion.
pub const ARCHIVE_LEAD_DAYS: u16 = 30;

/// Global retention window used when an event type has no explicit policy.
pub const DEFAULT_RETENTION_DAYS: u16 = 365;

/// Number of days a record must stay queryable before it may be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct RetentionDays(u16);

impl RetentionDays {
    /// Creates a validated retention window.
    pub fn new(days: u16) -> AppResult<Self> {
        if days == 0 {
            return Err(AppError::Validation(
                "retention_days must be greater than zero".to_owned(),
            ));
        }

        Ok(Self(days))
    }

    /// Parses a transport value such as a CLI argument.
    pub fn parse(value: &str) -> AppResult<Self> {
        let days = value.trim().parse::<u16>().map_err(|error| {
            AppError::Validation(format!("invalid retention days '{value}': {error}"))
        })?;
        Self::new(days)
    }

    /// Returns the window length in days.
    #[must_use]
    pub fn days(self) -> u16 {
        self.0
    }

    /// Returns the deletion cutoff relative to `now`.
    #[must_use]
    pub fn cutoff_from(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.0))
    }

    /// Returns the archive threshold: `max(30, days - 30)`, never later than
    /// the deletion cutoff itself.
    #[must_use]
    pub fn archive_threshold(self) -> Self {
        let lead = self.0.saturating_sub(ARCHIVE_LEAD_DAYS);
        Self(lead.max(MIN_ARCHIVE_THRESHOLD_DAYS).min(self.0))
    }

    /// Formats the window as an approximate human span.
    #[must_use]
    pub fn human_span(self) -> String {
        let days = f64::from(self.0);
        if self.0 >= 365 {
            format!("~{:.1} years", days / 365.0)
        } else if self.0 >= 30 {
            format!("~{:.1} months", days / 30.0)
        } else if self.0 == 1 {
            "1 day".to_owned()
        } else {
            format!("{} days", self.0)
        }
    }
}

impl TryFrom<u16> for RetentionDays {
    type Error = AppError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RetentionDays> for u16 {
    fn from(value: RetentionDays) -> Self {
        value.0
    }
}

impl Display for RetentionDays {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Returns whether a record timestamp lies strictly before the cutoff.
#[must_use]
pub fn is_past_cutoff(created_at: DateTime<Utc>, cutoff: DateTime<Utc>) -> bool {
    created_at < cutoff
}

/// Per-event-type retention windows with a global fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    default_days: RetentionDays,
    event_types: BTreeMap<EventType, RetentionDays>,
}

impl RetentionPolicy {
    /// Creates an empty policy that resolves every type to `default_days`.
    #[must_use]
    pub fn new(default_days: RetentionDays) -> Self {
        Self {
            default_days,
            event_types: BTreeMap::new(),
        }
    }

    /// Creates a policy seeded with the shipped per-type defaults.
    #[must_use]
    pub fn seeded(default_days: RetentionDays) -> Self {
        let mut policy = Self::new(default_days);
        for (event_type, days) in SEEDED_RETENTION_DAYS {
            if let (Ok(event_type), Ok(days)) = (EventType::new(*event_type), RetentionDays::new(*days))
            {
                policy.event_types.insert(event_type, days);
            }
        }
        policy
    }

    /// Creates a policy from stored per-type windows.
    #[must_use]
    pub fn from_entries(
        default_days: RetentionDays,
        event_types: BTreeMap<EventType, RetentionDays>,
    ) -> Self {
        Self {
            default_days,
            event_types,
        }
    }

    /// Returns the global fallback window.
    #[must_use]
    pub fn default_days(&self) -> RetentionDays {
        self.default_days
    }

    /// Resolves the retention window for one event type.
    #[must_use]
    pub fn retention_days_for(&self, event_type: &EventType) -> RetentionDays {
        self.event_types
            .get(event_type)
            .copied()
            .unwrap_or(self.default_days)
    }

    /// Returns whether the event type has an explicit window.
    #[must_use]
    pub fn is_configured(&self, event_type: &EventType) -> bool {
        self.event_types.contains_key(event_type)
    }

    /// Sets the window for one event type, replacing any previous value.
    pub fn set(&mut self, event_type: EventType, days: RetentionDays) {
        self.event_types.insert(event_type, days);
    }

    /// Returns explicitly configured windows ordered by event type.
    #[must_use]
    pub fn entries(&self) -> &BTreeMap<EventType, RetentionDays> {
        &self.event_types
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::seeded(RetentionDays(DEFAULT_RETENTION_DAYS))
    }
}

/// Event types that are never shortened by optimization suggestions.
pub const COMPLIANCE_EVENT_TYPES: &[&str] = &["authentication", "financial", "security"];

const SEEDED_RETENTION_DAYS: &[(&str, u16)] = &[
    ("api", 30),
    ("authentication", 90),
    ("data_change", 365),
    ("financial", 2555),
    ("security", 365),
    ("system", 90),
    ("user_management", 365),
];

/// Returns whether the event type carries compliance obligations.
#[must_use]
pub fn is_compliance_event_type(event_type: &EventType) -> bool {
    COMPLIANCE_EVENT_TYPES.contains(&event_type.as_str())
}
