use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;

use crate::types::{AuditEventId, UserId};

/// Recommended verb vocabulary. The column itself is a free string so new
/// screens can introduce verbs without a migration.
pub mod verbs {
    pub const ACCESS: &str = "access";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const VIEW: &str = "view";
    pub const EXPORT: &str = "export";
    pub const BULK_DELETE: &str = "bulk_delete";
    pub const LOGIN: &str = "login";
}

/// One immutable record of "who did what, to what, when".
///
/// `id` and `created_at` are assigned at insert time and never change. The
/// subject pair is either fully present or fully absent; the database enforces
/// this with a CHECK constraint and [`SubjectRef`] enforces it in code.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditEvent {
    pub id: AuditEventId,
    /// Absent for system-initiated events (e.g. the retention purge).
    pub actor_id: Option<UserId>,
    pub verb: String,
    pub description: String,
    pub subject_type: Option<String>,
    pub subject_id: Option<String>,
    pub metadata: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Returns the subject pair as a [`SubjectRef`] when present.
    pub fn subject(&self) -> Option<SubjectRef> {
        match (&self.subject_type, &self.subject_id) {
            (Some(kind), Some(id)) => Some(SubjectRef::new(kind.clone(), id.clone())),
            _ => None,
        }
    }
}

/// Advisory reference to the business entity an event concerns. Not a foreign
/// key: the referenced entity may have been deleted since.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRef {
    pub kind: String,
    pub id: String,
}

impl SubjectRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Dashboard counters derived from the audit trail.
///
/// `Default` is the all-zero snapshot the reporting service falls back to when
/// the store is unreachable, so dashboards always have something to render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuditStats {
    pub total: i64,
    /// Events recorded today, in the configured app timezone.
    pub today: i64,
    /// Distinct actors active within the last 7 days.
    pub active_actors_7d: i64,
    /// Events whose verb or description mentions "error", last 24 hours.
    pub error_logs_24h: i64,
    pub create_count: i64,
    pub update_count: i64,
    pub delete_count: i64,
    pub login_count: i64,
    /// Everything not covered by the named buckets, floored at zero.
    pub other_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_accessor_requires_both_fields() {
        let mut event = AuditEvent {
            id: AuditEventId::new(),
            actor_id: None,
            verb: verbs::VIEW.into(),
            description: "Viewed enrollment 42".into(),
            subject_type: Some("enrollment".into()),
            subject_id: Some("42".into()),
            metadata: None,
            created_at: Utc::now(),
        };
        assert_eq!(
            event.subject(),
            Some(SubjectRef::new("enrollment", "42"))
        );

        event.subject_id = None;
        assert_eq!(event.subject(), None);
    }

    #[test]
    fn default_stats_are_all_zero() {
        let stats = AuditStats::default();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.today, 0);
        assert_eq!(stats.active_actors_7d, 0);
        assert_eq!(stats.error_logs_24h, 0);
        assert_eq!(stats.other_count, 0);
    }
}
