use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};

use crate::models::audit_event::AuditEvent;
use crate::types::UserId;

const SELECT_COLUMNS: &str = "e.id, e.actor_id, e.verb, e.description, e.subject_type, \
     e.subject_id, e.metadata, e.created_at";

/// Filters are AND-combined; each one is optional. `search` is a
/// case-insensitive substring match OR'd across the event description, the
/// verb, and the actor's name and email.
#[derive(Debug, Clone, Default)]
pub struct AuditEventFilters {
    pub search: Option<String>,
    pub actor_id: Option<UserId>,
    pub verb: Option<String>,
    pub subject_type: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_to: Option<DateTime<Utc>>,
}

/// Columns the audit trail can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    CreatedAt,
    Verb,
    Description,
    ActorId,
    SubjectType,
}

impl SortColumn {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created_at" => Some(Self::CreatedAt),
            "verb" => Some(Self::Verb),
            "description" => Some(Self::Description),
            "actor_id" => Some(Self::ActorId),
            "subject_type" => Some(Self::SubjectType),
            _ => None,
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            Self::CreatedAt => "e.created_at",
            Self::Verb => "e.verb",
            Self::Description => "e.description",
            Self::ActorId => "e.actor_id",
            Self::SubjectType => "e.subject_type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// A single-column sort. Defaults to newest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(column: SortColumn, direction: SortDirection) -> Self {
        Self { column, direction }
    }

    pub fn ascending(column: SortColumn) -> Self {
        Self::new(column, SortDirection::Ascending)
    }

    /// Applies a column header click: selecting the current column flips the
    /// direction, selecting a different column resets to ascending.
    pub fn toggled(self, column: SortColumn) -> Self {
        if self.column == column {
            let direction = match self.direction {
                SortDirection::Ascending => SortDirection::Descending,
                SortDirection::Descending => SortDirection::Ascending,
            };
            Self::new(column, direction)
        } else {
            Self::ascending(column)
        }
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self::new(SortColumn::CreatedAt, SortDirection::Descending)
    }
}

pub async fn insert_audit_event<'c>(
    executor: impl PgExecutor<'c>,
    event: &AuditEvent,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_events \
         (id, actor_id, verb, description, subject_type, subject_id, metadata, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(event.id.to_string())
    .bind(event.actor_id.as_ref().map(|id| id.to_string()))
    .bind(&event.verb)
    .bind(&event.description)
    .bind(&event.subject_type)
    .bind(&event.subject_id)
    .bind(&event.metadata)
    .bind(event.created_at)
    .execute(executor)
    .await
    .map(|_| ())
}

pub async fn fetch_audit_event(
    pool: &PgPool,
    id: &str,
) -> Result<Option<AuditEvent>, sqlx::Error> {
    sqlx::query_as::<_, AuditEvent>(
        "SELECT id, actor_id, verb, description, subject_type, subject_id, metadata, created_at \
         FROM audit_events WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_audit_events(
    pool: &PgPool,
    filters: &AuditEventFilters,
    sort: Sort,
    per_page: i64,
    offset: i64,
) -> Result<(Vec<AuditEvent>, i64), sqlx::Error> {
    let items = query_audit_events(pool, filters, sort, Some((per_page, offset))).await?;

    let mut count_builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT COUNT(*) FROM audit_events e LEFT JOIN users u ON u.id = e.actor_id",
    );
    let mut count_has_clause = false;
    apply_audit_event_filters(&mut count_builder, &mut count_has_clause, filters);
    let total = count_builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok((items, total))
}

pub async fn export_audit_events(
    pool: &PgPool,
    filters: &AuditEventFilters,
    max_rows: i64,
) -> Result<Vec<AuditEvent>, sqlx::Error> {
    query_audit_events(pool, filters, Sort::default(), Some((max_rows, 0))).await
}

pub async fn delete_audit_events_before<'c>(
    executor: impl PgExecutor<'c>,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM audit_events WHERE created_at < $1")
        .bind(cutoff)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// One row of aggregate counters; field names match the SQL aliases.
#[derive(Debug, FromRow)]
pub struct StatsRow {
    pub total: i64,
    pub today: i64,
    pub active_actors: i64,
    pub error_logs: i64,
    pub creates: i64,
    pub updates: i64,
    pub deletes: i64,
    pub logins: i64,
}

pub async fn load_stats(
    pool: &PgPool,
    today_start: DateTime<Utc>,
    today_end: DateTime<Utc>,
    active_since: DateTime<Utc>,
    error_since: DateTime<Utc>,
) -> Result<StatsRow, sqlx::Error> {
    sqlx::query_as::<_, StatsRow>(
        "SELECT \
         COUNT(*) AS total, \
         COUNT(*) FILTER (WHERE created_at >= $1 AND created_at < $2) AS today, \
         COUNT(DISTINCT actor_id) FILTER (WHERE created_at >= $3) AS active_actors, \
         COUNT(*) FILTER (WHERE created_at >= $4 \
             AND (verb ILIKE '%error%' OR description ILIKE '%error%')) AS error_logs, \
         COUNT(*) FILTER (WHERE verb = 'create') AS creates, \
         COUNT(*) FILTER (WHERE verb = 'update') AS updates, \
         COUNT(*) FILTER (WHERE verb = 'delete') AS deletes, \
         COUNT(*) FILTER (WHERE verb = 'login') AS logins \
         FROM audit_events",
    )
    .bind(today_start)
    .bind(today_end)
    .bind(active_since)
    .bind(error_since)
    .fetch_one(pool)
    .await
}

async fn query_audit_events(
    pool: &PgPool,
    filters: &AuditEventFilters,
    sort: Sort,
    pagination: Option<(i64, i64)>,
) -> Result<Vec<AuditEvent>, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {SELECT_COLUMNS} FROM audit_events e LEFT JOIN users u ON u.id = e.actor_id",
    ));
    let mut has_clause = false;
    apply_audit_event_filters(&mut builder, &mut has_clause, filters);
    builder
        .push(" ORDER BY ")
        .push(sort.column.as_sql())
        .push(" ")
        .push(sort.direction.as_sql())
        .push(", e.id DESC");

    if let Some((per_page, offset)) = pagination {
        builder
            .push(" LIMIT ")
            .push_bind(per_page)
            .push(" OFFSET ")
            .push_bind(offset);
    }

    builder.build_query_as::<AuditEvent>().fetch_all(pool).await
}

fn apply_audit_event_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &AuditEventFilters,
) {
    if let Some(search) = filters.search.as_ref() {
        let pattern = like_pattern(search);
        push_clause(builder, has_clause);
        builder
            .push("(e.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR e.verb ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.full_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(actor_id) = filters.actor_id.as_ref() {
        push_clause(builder, has_clause);
        builder
            .push("e.actor_id = ")
            .push_bind(actor_id.to_string());
    }
    if let Some(verb) = filters.verb.as_ref() {
        push_clause(builder, has_clause);
        builder.push("e.verb = ").push_bind(verb.to_string());
    }
    if let Some(subject_type) = filters.subject_type.as_ref() {
        push_clause(builder, has_clause);
        builder
            .push("e.subject_type = ")
            .push_bind(subject_type.to_string());
    }
    if let Some(from) = filters.created_from.as_ref() {
        push_clause(builder, has_clause);
        builder.push("e.created_at >= ").push_bind(from.to_owned());
    }
    if let Some(to) = filters.created_to.as_ref() {
        push_clause(builder, has_clause);
        builder.push("e.created_at < ").push_bind(to.to_owned());
    }
}

fn push_clause(builder: &mut QueryBuilder<'_, Postgres>, has_clause: &mut bool) {
    if *has_clause {
        builder.push(" AND ");
    } else {
        builder.push(" WHERE ");
        *has_clause = true;
    }
}

/// Escapes LIKE wildcards so a search for "100%" matches the literal text.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
