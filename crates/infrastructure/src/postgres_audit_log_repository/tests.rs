use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use freightdesk_application::{AuditLogRepository, AuditRecordFilter};
use freightdesk_domain::{EventType, NewAuditLogRecord};

use super::PostgresAuditLogRepository;
use crate::MIGRATOR;

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres audit log tests: {error}");
    }

    Some(pool)
}

fn unique_event_type(prefix: &str) -> EventType {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    EventType::new(format!("{prefix}_{}", &suffix[..12]))
        .unwrap_or_else(|error| panic!("invalid test event type: {error}"))
}

async fn insert_aged(pool: &PgPool, event_type: &EventType, age_days: i32) {
    let insert = sqlx::query(
        r#"
            INSERT INTO audit_logs (event_type, action, actor_id, additional_data, created_at)
            VALUES ($1, 'seeded', 42, $2, now() - make_interval(days => $3))
            "#,
    )
    .bind(event_type.as_str())
    .bind(json!({ "age_days": age_days }))
    .bind(age_days)
    .execute(pool)
    .await;

    assert!(insert.is_ok());
}

#[tokio::test]
async fn purge_follows_per_type_cutoff() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAuditLogRepository::new(pool.clone());
    let event_type = unique_event_type("purge");
    insert_aged(&pool, &event_type, 120).await;
    insert_aged(&pool, &event_type, 60).await;

    let cutoff = Utc::now() - Duration::days(90);
    let filter = AuditRecordFilter::older_than(Some(&event_type), cutoff);

    let counted = repository.count_records(&filter).await;
    assert_eq!(counted.unwrap_or_default(), 1);

    let purged = repository.delete_records(&filter).await;
    assert_eq!(purged.unwrap_or_default(), 1);

    let remaining = repository
        .count_records(&AuditRecordFilter::for_event_type(&event_type))
        .await;
    assert_eq!(remaining.unwrap_or_default(), 1);
}

#[tokio::test]
async fn deletion_requires_a_cutoff() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAuditLogRepository::new(pool);
    let event_type = unique_event_type("guard");

    let result = repository
        .delete_records(&AuditRecordFilter::for_event_type(&event_type))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn restore_keeps_original_ids_and_rejects_duplicates() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAuditLogRepository::new(pool.clone());
    let event_type = unique_event_type("restore");
    insert_aged(&pool, &event_type, 400).await;
    insert_aged(&pool, &event_type, 380).await;

    let filter = AuditRecordFilter::for_event_type(&event_type);
    let selected = repository.find_records(&filter).await.unwrap_or_default();
    assert_eq!(selected.len(), 2);
    assert!(selected[0].created_at <= selected[1].created_at);

    let ids = selected.iter().map(|record| record.id).collect::<Vec<_>>();
    let deleted = repository.delete_by_ids(&ids).await;
    assert_eq!(deleted.unwrap_or_default(), 2);

    let restored = repository.insert_records(&selected).await;
    assert_eq!(restored.unwrap_or_default(), 2);
    assert_eq!(repository.find_records(&filter).await.unwrap_or_default(), selected);

    let duplicate = repository.insert_records(&selected).await;
    assert!(matches!(
        duplicate,
        Err(freightdesk_core::AppError::Conflict(_))
    ));

    let appended = repository
        .append_record(
            NewAuditLogRecord::new(event_type.clone(), "after_restore", None, None)
                .unwrap_or_else(|error| panic!("{error}")),
        )
        .await;
    assert!(appended.is_ok_and(|record| !ids.contains(&record.id)));
}

#[tokio::test]
async fn counts_group_by_event_type() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAuditLogRepository::new(pool.clone());
    let event_type = unique_event_type("count");
    insert_aged(&pool, &event_type, 1).await;
    insert_aged(&pool, &event_type, 2).await;

    let counts = repository.record_counts_by_event_type().await.unwrap_or_default();
    assert_eq!(counts.get(&event_type), Some(&2));

    let listed = repository.list_event_types().await.unwrap_or_default();
    assert!(listed.contains(&event_type));

    let oldest = repository
        .oldest_record_at(&AuditRecordFilter::for_event_type(&event_type))
        .await
        .unwrap_or_default();
    assert!(oldest.is_some_and(|oldest| oldest < Utc::now() - Duration::days(1)));
}

#[tokio::test]
async fn invalid_stored_event_types_are_skipped() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAuditLogRepository::new(pool.clone());
    let valid = unique_event_type("valid");
    insert_aged(&pool, &valid, 400).await;
    let invalid = format!("Bad Type {}", uuid::Uuid::new_v4().simple());
    let insert = sqlx::query(
        "INSERT INTO audit_logs (event_type, action, created_at) VALUES ($1, 'imported', now())",
    )
    .bind(invalid.as_str())
    .execute(&pool)
    .await;
    assert!(insert.is_ok());

    let listed = repository.list_event_types().await;
    let counts = repository.record_counts_by_event_type().await;

    let cleanup = sqlx::query("DELETE FROM audit_logs WHERE event_type = $1")
        .bind(invalid.as_str())
        .execute(&pool)
        .await;
    assert!(cleanup.is_ok());

    let listed = listed.unwrap_or_else(|error| panic!("{error}"));
    assert!(listed.contains(&valid));
    assert!(listed.iter().all(|event_type| event_type.as_str() != invalid));
    let counts = counts.unwrap_or_else(|error| panic!("{error}"));
    assert_eq!(counts.get(&valid), Some(&1));
}
