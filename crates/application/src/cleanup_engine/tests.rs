use std::sync::Arc;

use chrono::Duration;

use freightdesk_core::AppError;

use crate::ArchivalOrchestrator;

use crate::retention_lease::scope_key;
use crate::retention_ports::RunStage;
use crate::test_support::{FakeLeaseCoordinator, Fixture, days, event_type, policy};

use super::CleanupEngine;

#[tokio::test]
async fn automated_cleanup_applies_each_types_window() {
    let fixture = Fixture::new();
    fixture
        .repository
        .seed("authentication", Duration::days(120))
        .await;
    let kept = fixture
        .repository
        .seed("authentication", Duration::days(60))
        .await;
    let kept_security = fixture.repository.seed("security", Duration::days(200)).await;

    let cleanup = CleanupEngine::new(
        fixture.engine(policy(365, &[("authentication", 90), ("security", 365)])),
    );
    let summary = cleanup
        .run_automated_cleanup()
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(summary.total_deleted, 1);
    assert_eq!(
        summary.deleted_by_type.get(&event_type("authentication")),
        Some(&1)
    );
    assert!(summary.errors.is_empty());
    assert_eq!(fixture.repository.ids_of("authentication").await, vec![kept]);
    assert_eq!(fixture.repository.ids_of("security").await, vec![kept_security]);

    let system = fixture.repository.records_of("system").await;
    assert_eq!(system.len(), 1);
    assert_eq!(system[0].action, "audit_logs_purged");
}

#[tokio::test]
async fn unconfigured_types_fall_back_to_the_default_window() {
    let fixture = Fixture::new();
    fixture.repository.seed("webhook", Duration::days(40)).await;
    fixture.repository.seed("webhook", Duration::days(10)).await;

    let cleanup = CleanupEngine::new(fixture.engine(policy(30, &[])));
    let summary = cleanup
        .run_automated_cleanup()
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(summary.deleted_by_type.get(&event_type("webhook")), Some(&1));
    assert_eq!(fixture.repository.ids_of("webhook").await.len(), 1);
}

#[tokio::test]
async fn cleanup_event_type_keeps_the_boundary_record() {
    let fixture = Fixture::new();
    let at_cutoff = fixture
        .repository
        .seed("security", Duration::days(30))
        .await;
    fixture
        .repository
        .seed("security", Duration::days(30) + Duration::seconds(1))
        .await;

    let cleanup = CleanupEngine::new(fixture.engine(policy(365, &[])));
    let outcome = cleanup
        .cleanup_event_type(&event_type("security"), days(30))
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(outcome.deleted, 1);
    assert!(!outcome.has_errors());
    assert_eq!(fixture.repository.ids_of("security").await, vec![at_cutoff]);
}

#[tokio::test]
async fn failing_type_does_not_stop_the_others() {
    let fixture = Fixture::new();
    fixture.repository.seed("api", Duration::days(100)).await;
    fixture.repository.seed("security", Duration::days(400)).await;
    fixture.repository.fail_deletes_for("api").await;

    let cleanup = CleanupEngine::new(fixture.engine(policy(365, &[("api", 30)])));
    let summary = cleanup
        .run_automated_cleanup()
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(summary.total_deleted, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].event_type, event_type("api"));
    assert_eq!(summary.errors[0].stage, RunStage::Deleting);
    assert!(fixture.repository.ids_of("security").await.is_empty());
}

#[tokio::test]
async fn cleanup_older_than_ignores_per_type_windows() {
    let fixture = Fixture::new();
    fixture.repository.seed("financial", Duration::days(45)).await;
    fixture.repository.seed("security", Duration::days(45)).await;
    fixture.repository.seed("security", Duration::days(5)).await;

    let cleanup = CleanupEngine::new(
        fixture.engine(policy(365, &[("financial", 2555), ("security", 365)])),
    );
    let outcome = cleanup
        .cleanup_older_than(days(30))
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(outcome.deleted, 2);
    assert!(fixture.repository.ids_of("financial").await.is_empty());
    assert_eq!(fixture.repository.ids_of("security").await.len(), 1);
}

#[tokio::test]
async fn nothing_expired_records_no_purge() {
    let fixture = Fixture::new();
    fixture.repository.seed("security", Duration::days(5)).await;

    let cleanup = CleanupEngine::new(fixture.engine(policy(365, &[])));
    let summary = cleanup
        .run_automated_cleanup()
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(summary.total_deleted, 0);
    assert!(fixture.repository.records_of("system").await.is_empty());
}

#[tokio::test]
async fn held_lease_rejects_single_type_cleanup() {
    let fixture = Fixture::new();
    fixture.repository.seed("security", Duration::days(400)).await;

    let coordinator = Arc::new(FakeLeaseCoordinator::default());
    coordinator.hold(&scope_key(&event_type("security"))).await;

    let cleanup = CleanupEngine::new(fixture.engine(policy(365, &[])))
        .with_lease_coordinator(coordinator, "worker-b", 60);
    let result = cleanup
        .cleanup_event_type(&event_type("security"), days(30))
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(fixture.repository.ids_of("security").await.len(), 1);
}

#[tokio::test]
async fn failed_purge_record_still_reports_the_delete() {
    let fixture = Fixture::new();
    fixture.repository.seed("security", Duration::days(400)).await;
    fixture.repository.seed("security", Duration::days(5)).await;
    fixture.repository.fail_appends().await;

    let cleanup = CleanupEngine::new(fixture.engine(policy(365, &[])));
    let outcome = cleanup
        .cleanup_older_than(days(30))
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(outcome.deleted, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].stage, RunStage::Recording);
    assert_eq!(fixture.repository.ids_of("security").await.len(), 1);
}

#[tokio::test]
async fn failed_lease_release_still_reports_the_delete() {
    let fixture = Fixture::new();
    fixture.repository.seed("security", Duration::days(400)).await;

    let coordinator = Arc::new(FakeLeaseCoordinator::default());
    coordinator.fail_releases().await;

    let cleanup = CleanupEngine::new(fixture.engine(policy(365, &[])))
        .with_lease_coordinator(coordinator, "worker-b", 60);
    let outcome = cleanup
        .cleanup_event_type(&event_type("security"), days(30))
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(outcome.deleted, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].event_type, event_type("security"));
    assert_eq!(outcome.errors[0].stage, RunStage::Leasing);
    assert_eq!(fixture.repository.records_of("system").await.len(), 1);
}

#[tokio::test]
async fn pinned_run_does_not_purge_rows_that_crossed_the_cutoff_after_archival() {
    let fixture = Fixture::new();
    let boundary = fixture
        .repository
        .seed("api", Duration::days(30) - Duration::seconds(1))
        .await;

    let engine = fixture.engine(policy(365, &[("api", 30)])).pinned();
    let archival = ArchivalOrchestrator::new(engine.clone(), fixture.archive_writer.clone())
        .archive_old_logs(None)
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert_eq!(archival.total_archived, 0);

    fixture.clock.advance(Duration::seconds(5));
    let cleanup = CleanupEngine::new(engine)
        .run_automated_cleanup()
        .await
        .unwrap_or_else(|error| panic!("{error}"));

    assert_eq!(cleanup.total_deleted, 0);
    assert_eq!(fixture.repository.ids_of("api").await, vec![boundary]);
}
