use freightdesk_core::env::{optional_env, parse_env, required_env};
use freightdesk_core::{AppError, AppResult};
use freightdesk_domain::{DEFAULT_RETENTION_DAYS, RetentionDays};

/// Environment-derived settings for one console invocation.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub database_url: String,
    pub archive_dir: String,
    pub redis_url: Option<String>,
    pub lease_seconds: u32,
    pub default_retention_days: RetentionDays,
    pub holder_id: String,
}

impl ConsoleConfig {
    pub fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let archive_dir = optional_env("AUDIT_ARCHIVE_DIR")
            .unwrap_or_else(|| "storage/app/audit-archives".to_owned());
        let redis_url = optional_env("REDIS_URL");
        let lease_seconds = parse_env("AUDIT_LEASE_SECONDS", 900_u32)?;
        let default_retention_days =
            parse_env("AUDIT_DEFAULT_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;

        if lease_seconds == 0 {
            return Err(AppError::Validation(
                "AUDIT_LEASE_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            archive_dir,
            redis_url,
            lease_seconds,
            default_retention_days: RetentionDays::new(default_retention_days)?,
            holder_id: format!("console-{}", std::process::id()),
        })
    }
}
