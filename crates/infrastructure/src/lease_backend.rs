use std::sync::Arc;

use sqlx::PgPool;

use freightdesk_application::ArchivalLeaseCoordinator;
use freightdesk_core::{AppError, AppResult};

use crate::{PostgresAdvisoryLeaseCoordinator, RedisArchivalLeaseCoordinator};

/// Key prefix for Redis-held retention leases.
pub const LEASE_KEY_PREFIX: &str = "freightdesk:lease";

/// Selects the cross-process lease backend for a binary.
///
/// Redis is used when `redis_url` is set; otherwise leases fall back to
/// PostgreSQL advisory locks on the shared database. Returns the backend name
/// for startup logging.
pub fn shared_lease_coordinator(
    redis_url: Option<&str>,
    pool: PgPool,
) -> AppResult<(Arc<dyn ArchivalLeaseCoordinator>, &'static str)> {
    match redis_url {
        Some(redis_url) => {
            let client = redis::Client::open(redis_url)
                .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;
            Ok((
                Arc::new(RedisArchivalLeaseCoordinator::new(client, LEASE_KEY_PREFIX)),
                "redis",
            ))
        }
        None => Ok((
            Arc::new(PostgresAdvisoryLeaseCoordinator::new(pool)),
            "postgres_advisory",
        )),
    }
}
