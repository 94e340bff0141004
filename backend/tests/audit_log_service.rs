use chrono::Utc;
use serde_json::json;

use gradekeeper_backend::{
    models::audit_event::SubjectRef,
    models::PageRequest,
    repositories::audit_event::{AuditEventFilters, Sort},
    services::audit_log::{AuditLogService, AuditLogServiceTrait, NewAuditEvent, RecordError},
    services::audit_report::AuditReportService,
};

mod support;

use support::{migrate_db, test_pool, unique_verb};

fn new_event(verb: &str, description: &str) -> NewAuditEvent {
    NewAuditEvent {
        actor_id: None,
        verb: verb.to_string(),
        description: description.to_string(),
        subject: None,
        metadata: None,
    }
}

#[tokio::test]
async fn insert_then_list_returns_exactly_one_matching_row() {
    let pool = test_pool().await;
    migrate_db(&pool).await;

    let service = AuditLogService::new(pool.clone());
    let report = AuditReportService::new(pool.clone(), chrono_tz::UTC);
    let verb = unique_verb("promote");

    let before = Utc::now();
    let stored = service
        .insert(new_event(&verb, "Promoted student to next grade"))
        .await
        .expect("insert audit event");
    let after = Utc::now();

    assert!(stored.created_at >= before && stored.created_at <= after);

    let filters = AuditEventFilters {
        verb: Some(verb.clone()),
        ..Default::default()
    };
    let page = report
        .list(&filters, Sort::default(), PageRequest::default())
        .await
        .expect("list audit events");

    assert_eq!(page.total, 1);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, stored.id);
    assert_eq!(page.items[0].verb, verb);
    assert_eq!(page.items[0].description, "Promoted student to next grade");
}

#[tokio::test]
async fn insert_persists_subject_and_metadata() {
    let pool = test_pool().await;
    migrate_db(&pool).await;

    let service = AuditLogService::new(pool.clone());
    let report = AuditReportService::new(pool.clone(), chrono_tz::UTC);

    let mut event = new_event(&unique_verb("enroll"), "Enrolled student in Algebra");
    event.subject = Some(SubjectRef::new("enrollment", "enr-17"));
    event.metadata = Some(json!({ "previous": null, "class": "Algebra" }));

    let stored = service.insert(event).await.expect("insert audit event");
    let fetched = report
        .find(stored.id)
        .await
        .expect("fetch audit event")
        .expect("audit event exists");

    assert_eq!(fetched.subject(), Some(SubjectRef::new("enrollment", "enr-17")));
    assert_eq!(
        fetched.metadata.map(|value| value.0),
        Some(json!({ "previous": null, "class": "Algebra" }))
    );
}

#[tokio::test]
async fn insert_rejects_blank_verb_and_description() {
    let pool = test_pool().await;
    migrate_db(&pool).await;

    let service = AuditLogService::new(pool.clone());

    let result = service.insert(new_event("  ", "Something happened")).await;
    assert!(matches!(result, Err(RecordError::EmptyVerb)));

    let result = service.insert(new_event("create", "")).await;
    assert!(matches!(result, Err(RecordError::EmptyDescription)));
}

#[tokio::test]
async fn record_is_best_effort_when_store_is_down() {
    let pool = test_pool().await;
    migrate_db(&pool).await;

    let service = AuditLogService::new(pool.clone());
    pool.close().await;

    // Must not panic or return an error to the caller; the failure only goes
    // to the operational log.
    service
        .record(new_event("create", "Created subject while store is down"))
        .await;
}

#[tokio::test]
async fn record_persists_on_the_happy_path() {
    let pool = test_pool().await;
    migrate_db(&pool).await;

    let service = AuditLogService::new(pool.clone());
    let report = AuditReportService::new(pool.clone(), chrono_tz::UTC);
    let verb = unique_verb("export");

    service.record(new_event(&verb, "Exported report cards")).await;

    let filters = AuditEventFilters {
        verb: Some(verb),
        ..Default::default()
    };
    let page = report
        .list(&filters, Sort::default(), PageRequest::default())
        .await
        .expect("list audit events");
    assert_eq!(page.total, 1);
}
