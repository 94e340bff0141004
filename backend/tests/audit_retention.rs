use chrono::{Duration, Utc};

use gradekeeper_backend::{
    models::audit_event::verbs,
    models::PageRequest,
    repositories::audit_event::{AuditEventFilters, Sort},
    services::audit_log::{AuditLogService, AuditLogServiceTrait},
    services::audit_report::AuditReportService,
};

mod support;

use support::{
    integration_guard, migrate_db, seed_audit_event, test_pool, truncate_audit_events, SeedEvent,
};

async fn bulk_delete_events(report: &AuditReportService) -> Vec<gradekeeper_backend::models::audit_event::AuditEvent> {
    let filters = AuditEventFilters {
        verb: Some(verbs::BULK_DELETE.to_string()),
        ..Default::default()
    };
    report
        .list(&filters, Sort::default(), PageRequest::new(1, 100))
        .await
        .expect("list bulk_delete events")
        .items
}

#[tokio::test]
async fn purge_deletes_old_rows_and_records_one_event() {
    let _guard = integration_guard().await;
    let pool = test_pool().await;
    migrate_db(&pool).await;
    truncate_audit_events(&pool).await;

    for n in 0..3 {
        seed_audit_event(
            &pool,
            SeedEvent::new("update", &format!("Stale row {}", n))
                .at(Utc::now() - Duration::days(100)),
        )
        .await;
    }
    seed_audit_event(&pool, SeedEvent::new("update", "Fresh row")).await;

    let service = AuditLogService::new(pool.clone());
    let report = AuditReportService::new(pool.clone(), chrono_tz::UTC);

    let deleted = service.purge_older_than(90).await.expect("purge");
    assert_eq!(deleted, 3);

    // Exactly one bulk_delete event, system-initiated, describing the purge.
    let events = bulk_delete_events(&report).await;
    assert_eq!(events.len(), 1);
    let purge_event = &events[0];
    assert_eq!(purge_event.verb, verbs::BULK_DELETE);
    assert!(purge_event.actor_id.is_none());
    assert!(purge_event.description.contains("3"));
    assert!(purge_event.description.contains("90"));
    let metadata = purge_event.metadata.as_ref().expect("purge metadata").0.clone();
    assert_eq!(metadata["deleted"], 3);
    assert_eq!(metadata["older_than_days"], 90);

    // Everything older than the cutoff is gone; the fresh row and the purge
    // event remain.
    let all = report
        .list(&AuditEventFilters::default(), Sort::default(), PageRequest::new(1, 100))
        .await
        .expect("list all");
    assert_eq!(all.total, 2);
    let cutoff = Utc::now() - Duration::days(90);
    assert!(all.items.iter().all(|event| event.created_at >= cutoff));
}

#[tokio::test]
async fn purge_is_idempotent_in_effect() {
    let _guard = integration_guard().await;
    let pool = test_pool().await;
    migrate_db(&pool).await;
    truncate_audit_events(&pool).await;

    for n in 0..2 {
        seed_audit_event(
            &pool,
            SeedEvent::new("delete", &format!("Stale row {}", n))
                .at(Utc::now() - Duration::days(120)),
        )
        .await;
    }

    let service = AuditLogService::new(pool.clone());
    let report = AuditReportService::new(pool.clone(), chrono_tz::UTC);

    let first = service.purge_older_than(90).await.expect("first purge");
    assert_eq!(first, 2);

    let second = service.purge_older_than(90).await.expect("second purge");
    assert_eq!(second, 0);

    // Both runs are on record, including the zero-count one.
    let events = bulk_delete_events(&report).await;
    assert_eq!(events.len(), 2);
    let deleted_counts: Vec<i64> = events
        .iter()
        .map(|event| {
            event.metadata.as_ref().expect("purge metadata").0["deleted"]
                .as_i64()
                .expect("deleted count")
        })
        .collect();
    assert!(deleted_counts.contains(&2));
    assert!(deleted_counts.contains(&0));
}

#[tokio::test]
async fn purge_spares_rows_at_or_after_the_cutoff() {
    let _guard = integration_guard().await;
    let pool = test_pool().await;
    migrate_db(&pool).await;
    truncate_audit_events(&pool).await;

    // Just inside the window: must survive.
    seed_audit_event(
        &pool,
        SeedEvent::new("create", "Barely recent")
            .at(Utc::now() - Duration::days(30) + Duration::minutes(5)),
    )
    .await;

    let service = AuditLogService::new(pool.clone());
    let deleted = service.purge_older_than(30).await.expect("purge");
    assert_eq!(deleted, 0);

    let report = AuditReportService::new(pool.clone(), chrono_tz::UTC);
    let filters = AuditEventFilters {
        verb: Some("create".to_string()),
        ..Default::default()
    };
    let page = report
        .list(&filters, Sort::default(), PageRequest::default())
        .await
        .expect("list");
    assert_eq!(page.total, 1);
}
