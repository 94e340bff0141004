//! Read path of the audit trail: filtered listings, exports, and the
//! dashboard counters.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;

use crate::models::audit_event::{AuditEvent, AuditStats};
use crate::models::{Page, PageRequest};
use crate::repositories::audit_event::{self as audit_event_repo, AuditEventFilters, Sort};
use crate::types::AuditEventId;
use crate::utils::time;

#[derive(Debug, Clone)]
pub struct AuditReportService {
    pool: PgPool,
    time_zone: Tz,
}

impl AuditReportService {
    pub fn new(pool: PgPool, time_zone: Tz) -> Self {
        Self { pool, time_zone }
    }

    /// Returns one page of events matching `filters`, in `sort` order. A page
    /// past the end of the result set is empty, not an error.
    pub async fn list(
        &self,
        filters: &AuditEventFilters,
        sort: Sort,
        page: PageRequest,
    ) -> Result<Page<AuditEvent>, sqlx::Error> {
        let per_page = page.per_page();
        let (items, total) =
            audit_event_repo::list_audit_events(&self.pool, filters, sort, per_page, page.offset())
                .await?;
        Ok(Page {
            page: page.page(),
            per_page,
            total,
            items,
        })
    }

    /// Returns all matching events, newest first, capped at `max_rows`.
    pub async fn export(
        &self,
        filters: &AuditEventFilters,
        max_rows: i64,
    ) -> Result<Vec<AuditEvent>, sqlx::Error> {
        audit_event_repo::export_audit_events(&self.pool, filters, max_rows).await
    }

    pub async fn find(&self, id: AuditEventId) -> Result<Option<AuditEvent>, sqlx::Error> {
        audit_event_repo::fetch_audit_event(&self.pool, &id.to_string()).await
    }

    /// Dashboard counters as of `as_of`. Degrades to the all-zero snapshot
    /// when the store is unreachable so dashboards stay renderable.
    pub async fn stats(&self, as_of: DateTime<Utc>) -> AuditStats {
        match self.load_stats(as_of).await {
            Ok(stats) => stats,
            Err(err) => {
                tracing::warn!(error = %err, "audit stats query failed, serving empty snapshot");
                AuditStats::default()
            }
        }
    }

    /// Converts a calendar day in the app timezone into the UTC bounds used
    /// by the `created_from`/`created_to` filters.
    pub fn day_bounds(&self, day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        time::local_day_bounds_utc(day, &self.time_zone)
    }

    async fn load_stats(&self, as_of: DateTime<Utc>) -> Result<AuditStats, sqlx::Error> {
        let today = as_of.with_timezone(&self.time_zone).date_naive();
        let (today_start, today_end) = time::local_day_bounds_utc(today, &self.time_zone);
        let row = audit_event_repo::load_stats(
            &self.pool,
            today_start,
            today_end,
            as_of - Duration::days(7),
            as_of - Duration::hours(24),
        )
        .await?;

        let named = row.creates + row.updates + row.deletes + row.logins;
        Ok(AuditStats {
            total: row.total,
            today: row.today,
            active_actors_7d: row.active_actors,
            error_logs_24h: row.error_logs,
            create_count: row.creates,
            update_count: row.updates,
            delete_count: row.deletes,
            login_count: row.logins,
            other_count: (row.total - named).max(0),
        })
    }
}
