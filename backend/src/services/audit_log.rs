//! Write path of the audit trail: recording events and the retention purge.
//!
//! Recording is best-effort by policy. Every call site goes through
//! [`AuditLogServiceTrait::record`], which reports persistence failures to the
//! operational log and never propagates them, so an audit backend outage can
//! never abort the business action being recorded.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::{types::Json, PgPool};
use thiserror::Error;

use crate::models::audit_event::{verbs, AuditEvent, SubjectRef};
use crate::repositories::audit_event as audit_event_repo;
use crate::types::{AuditEventId, UserId};

/// An event to be recorded. `verb` and `description` must be non-empty; the
/// subject pair travels as a single [`SubjectRef`] so a half-set reference
/// cannot be expressed.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub actor_id: Option<UserId>,
    pub verb: String,
    pub description: String,
    pub subject: Option<SubjectRef>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("audit event verb must not be empty")]
    EmptyVerb,
    #[error("audit event description must not be empty")]
    EmptyDescription,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait AuditLogServiceTrait: Send + Sync {
    /// Records one event, best-effort. Failures are logged and swallowed.
    async fn record(&self, event: NewAuditEvent);

    /// Deletes all events strictly older than `days` days and records one
    /// `bulk_delete` event describing the purge. Returns the deleted count.
    async fn purge_older_than(&self, days: u32) -> Result<u64, sqlx::Error>;
}

#[derive(Debug, Clone)]
pub struct AuditLogService {
    pool: PgPool,
}

impl AuditLogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts one event and returns the stored row. Unlike
    /// [`AuditLogServiceTrait::record`] this surfaces failures, for callers
    /// that need to know the insert happened (tests, the purge).
    pub async fn insert(&self, event: NewAuditEvent) -> Result<AuditEvent, RecordError> {
        let row = build_event(event)?;
        audit_event_repo::insert_audit_event(&self.pool, &row).await?;
        Ok(row)
    }
}

#[async_trait]
impl AuditLogServiceTrait for AuditLogService {
    async fn record(&self, event: NewAuditEvent) {
        let verb = event.verb.clone();
        if let Err(err) = self.insert(event).await {
            tracing::warn!(error = %err, verb = %verb, "failed to record audit event");
        }
    }

    async fn purge_older_than(&self, days: u32) -> Result<u64, sqlx::Error> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));

        // The delete and the event describing it commit together: a failure
        // after the delete rolls both back, so no partial purge is ever
        // observable. The event is inserted after the delete ran, so it can
        // never match its own invocation's predicate.
        let mut tx = self.pool.begin().await?;
        let deleted = audit_event_repo::delete_audit_events_before(&mut *tx, cutoff).await?;

        let purge_event = AuditEvent {
            id: AuditEventId::new(),
            actor_id: None,
            verb: verbs::BULK_DELETE.to_string(),
            description: format!(
                "Purged {} audit events older than {} days",
                deleted, days
            ),
            subject_type: None,
            subject_id: None,
            metadata: Some(Json(json!({
                "deleted": deleted,
                "older_than_days": days,
                "cutoff": cutoff,
            }))),
            created_at: Utc::now(),
        };
        audit_event_repo::insert_audit_event(&mut *tx, &purge_event).await?;
        tx.commit().await?;

        Ok(deleted)
    }
}

fn build_event(event: NewAuditEvent) -> Result<AuditEvent, RecordError> {
    if event.verb.trim().is_empty() {
        return Err(RecordError::EmptyVerb);
    }
    if event.description.trim().is_empty() {
        return Err(RecordError::EmptyDescription);
    }

    let (subject_type, subject_id) = match event.subject {
        Some(subject) => (Some(subject.kind), Some(subject.id)),
        None => (None, None),
    };

    Ok(AuditEvent {
        id: AuditEventId::new(),
        actor_id: event.actor_id,
        verb: event.verb,
        description: event.description,
        subject_type,
        subject_id,
        metadata: event.metadata.map(Json),
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_event(verb: &str, description: &str) -> NewAuditEvent {
        NewAuditEvent {
            actor_id: None,
            verb: verb.into(),
            description: description.into(),
            subject: None,
            metadata: None,
        }
    }

    #[test]
    fn build_event_rejects_empty_verb() {
        let result = build_event(new_event("", "something happened"));
        assert!(matches!(result, Err(RecordError::EmptyVerb)));

        let result = build_event(new_event("   ", "something happened"));
        assert!(matches!(result, Err(RecordError::EmptyVerb)));
    }

    #[test]
    fn build_event_rejects_empty_description() {
        let result = build_event(new_event(verbs::CREATE, ""));
        assert!(matches!(result, Err(RecordError::EmptyDescription)));
    }

    #[test]
    fn build_event_splits_subject_pair() {
        let mut event = new_event(verbs::UPDATE, "Updated payment plan 7");
        event.subject = Some(SubjectRef::new("payment_plan", "7"));
        let row = build_event(event).expect("build event");
        assert_eq!(row.subject_type.as_deref(), Some("payment_plan"));
        assert_eq!(row.subject_id.as_deref(), Some("7"));
    }

    #[test]
    fn build_event_leaves_subject_absent_when_not_given() {
        let row = build_event(new_event(verbs::ACCESS, "Accessed subjects list"))
            .expect("build event");
        assert!(row.subject_type.is_none());
        assert!(row.subject_id.is_none());
    }

    #[test]
    fn build_event_stamps_id_and_created_at() {
        let before = Utc::now();
        let row = build_event(new_event(verbs::LOGIN, "Signed in")).expect("build event");
        let after = Utc::now();
        assert!(row.created_at >= before && row.created_at <= after);
        assert!(!row.id.to_string().is_empty());
    }
}
