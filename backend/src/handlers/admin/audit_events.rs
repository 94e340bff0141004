use axum::{
    body::Body,
    extract::{Extension, Path, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue,
    },
    response::Response,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    error::AppError,
    models::audit_event::{AuditEvent, AuditStats},
    models::user::User,
    models::PageRequest,
    repositories::audit_event::{AuditEventFilters, Sort, SortColumn, SortDirection},
    state::AppState,
    types::{AuditEventId, UserId},
    utils::time,
};

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_PER_PAGE: i64 = 25;
const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct AuditEventListQuery {
    /// Substring match across description, verb, and actor name/email.
    pub search: Option<String>,
    pub actor_id: Option<String>,
    pub verb: Option<String>,
    pub subject_type: Option<String>,
    /// Calendar day (YYYY-MM-DD) in the app timezone.
    pub on: Option<String>,
    /// Sort column: created_at, verb, description, actor_id, subject_type.
    pub sort: Option<String>,
    /// Sort direction: asc or desc.
    pub dir: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct AuditEventExportQuery {
    pub search: Option<String>,
    pub actor_id: Option<String>,
    pub verb: Option<String>,
    pub subject_type: Option<String>,
    pub on: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditEventResponse {
    pub id: String,
    pub actor_id: Option<String>,
    pub verb: String,
    pub description: String,
    pub subject_type: Option<String>,
    pub subject_id: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditEvent> for AuditEventResponse {
    fn from(event: AuditEvent) -> Self {
        Self {
            id: event.id.to_string(),
            actor_id: event.actor_id.map(|id| id.to_string()),
            verb: event.verb,
            description: event.description,
            subject_type: event.subject_type,
            subject_id: event.subject_id,
            metadata: event.metadata.map(|value| value.0),
            created_at: event.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditEventListResponse {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub items: Vec<AuditEventResponse>,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct PurgeRequest {
    /// Events strictly older than this many days are deleted.
    #[validate(range(min = 1, max = 3650))]
    pub days: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PurgeResponse {
    pub deleted: u64,
    pub older_than_days: u32,
}

#[utoipa::path(
    get,
    path = "/api/admin/audit-events",
    params(AuditEventListQuery),
    responses(
        (status = 200, description = "One page of audit events", body = AuditEventListResponse),
        (status = 400, description = "Invalid filter, sort, or paging parameter"),
        (status = 403, description = "Caller is not an administrator")
    ),
    tag = "audit-events"
)]
pub async fn list_audit_events(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(q): Query<AuditEventListQuery>,
) -> Result<Json<AuditEventListResponse>, AppError> {
    ensure_admin(&user)?;

    let (page, sort, filters) = validate_list_query(q, &state)?;
    let result = state
        .audit_report
        .list(&filters, sort, page)
        .await
        .map_err(AppError::from)?;

    Ok(Json(AuditEventListResponse {
        page: result.page,
        per_page: result.per_page,
        total: result.total,
        items: result
            .items
            .into_iter()
            .map(AuditEventResponse::from)
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/audit-events/stats",
    responses(
        (status = 200, description = "Dashboard counters; all-zero when the store is unreachable", body = AuditStats),
        (status = 403, description = "Caller is not an administrator")
    ),
    tag = "audit-events"
)]
pub async fn get_audit_stats(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<AuditStats>, AppError> {
    ensure_admin(&user)?;

    Ok(Json(state.audit_report.stats(Utc::now()).await))
}

#[utoipa::path(
    get,
    path = "/api/admin/audit-events/export",
    params(AuditEventExportQuery),
    responses(
        (status = 200, description = "Matching audit events as a JSON attachment"),
        (status = 400, description = "Invalid filter parameter"),
        (status = 403, description = "Caller is not an administrator")
    ),
    tag = "audit-events"
)]
pub async fn export_audit_events(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(q): Query<AuditEventExportQuery>,
) -> Result<Response, AppError> {
    ensure_admin(&user)?;

    let filters = build_filters(
        FilterInput {
            search: q.search,
            actor_id: q.actor_id,
            verb: q.verb,
            subject_type: q.subject_type,
            on: q.on,
        },
        &state,
    )?;
    let events = state
        .audit_report
        .export(&filters, state.config.audit_export_max_rows)
        .await
        .map_err(AppError::from)?;

    let payload: Vec<AuditEventResponse> =
        events.into_iter().map(AuditEventResponse::from).collect();
    let body = serde_json::to_vec(&payload).map_err(|e| AppError::InternalServerError(e.into()))?;

    let filename = format!(
        "audit_events_{}.json",
        time::now_in_timezone(&state.config.time_zone).format("%Y%m%d_%H%M%S")
    );
    let mut response = Response::new(Body::from(body));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response.headers_mut().insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    Ok(response)
}

#[utoipa::path(
    get,
    path = "/api/admin/audit-events/{id}",
    params(("id" = String, Path, description = "Audit event ID")),
    responses(
        (status = 200, description = "One audit event", body = AuditEventResponse),
        (status = 404, description = "No such event"),
        (status = 403, description = "Caller is not an administrator")
    ),
    tag = "audit-events"
)]
pub async fn get_audit_event_detail(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<AuditEventResponse>, AppError> {
    ensure_admin(&user)?;

    let event_id = AuditEventId::from_str(&id)
        .map_err(|_| AppError::BadRequest("Invalid audit event ID".into()))?;

    let event = state
        .audit_report
        .find(event_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound("Not found".into()))?;

    Ok(Json(AuditEventResponse::from(event)))
}

#[utoipa::path(
    post,
    path = "/api/admin/audit-events/purge",
    request_body = PurgeRequest,
    responses(
        (status = 200, description = "Purge completed; nothing was deleted on failure", body = PurgeResponse),
        (status = 400, description = "Retention window out of range"),
        (status = 403, description = "Caller is not an administrator")
    ),
    tag = "audit-events"
)]
pub async fn purge_audit_events(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<PurgeRequest>,
) -> Result<Json<PurgeResponse>, AppError> {
    ensure_admin(&user)?;
    payload.validate()?;

    let deleted = state
        .audit_log
        .purge_older_than(payload.days)
        .await
        .map_err(AppError::from)?;

    Ok(Json(PurgeResponse {
        deleted,
        older_than_days: payload.days,
    }))
}

fn ensure_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Forbidden".into()))
    }
}

struct FilterInput {
    search: Option<String>,
    actor_id: Option<String>,
    verb: Option<String>,
    subject_type: Option<String>,
    on: Option<String>,
}

fn validate_list_query(
    q: AuditEventListQuery,
    state: &AppState,
) -> Result<(PageRequest, Sort, AuditEventFilters), AppError> {
    let page = q.page.unwrap_or(DEFAULT_PAGE).max(1);
    let per_page = q
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let sort = parse_sort(q.sort.as_deref(), q.dir.as_deref())?;
    let filters = build_filters(
        FilterInput {
            search: q.search,
            actor_id: q.actor_id,
            verb: q.verb,
            subject_type: q.subject_type,
            on: q.on,
        },
        state,
    )?;
    Ok((PageRequest::new(page, per_page), sort, filters))
}

fn parse_sort(sort: Option<&str>, dir: Option<&str>) -> Result<Sort, AppError> {
    let Some(sort) = sort.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(Sort::default());
    };
    let column = SortColumn::parse(sort)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown sort column: {}", sort)))?;

    // A newly selected column sorts ascending unless a direction is given.
    let direction = match dir.map(str::trim).filter(|value| !value.is_empty()) {
        None => SortDirection::Ascending,
        Some("asc") => SortDirection::Ascending,
        Some("desc") => SortDirection::Descending,
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "`dir` must be asc or desc, got {}",
                other
            )))
        }
    };
    Ok(Sort::new(column, direction))
}

fn build_filters(input: FilterInput, state: &AppState) -> Result<AuditEventFilters, AppError> {
    let actor_id = input
        .actor_id
        .filter(|s| !s.trim().is_empty())
        .map(|s| UserId::from_str(s.trim()))
        .transpose()
        .map_err(|_| AppError::BadRequest("Invalid actor ID".into()))?;

    let (created_from, created_to) = match normalize_filter(input.on) {
        Some(raw) => {
            let day = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| AppError::BadRequest("`on` must be a date (YYYY-MM-DD)".into()))?;
            let (from, to) = state.audit_report.day_bounds(day);
            (Some(from), Some(to))
        }
        None => (None, None),
    };

    Ok(AuditEventFilters {
        search: normalize_filter(input.search),
        actor_id,
        verb: normalize_filter(input.verb).map(|value| value.to_ascii_lowercase()),
        subject_type: normalize_filter(input.subject_type).map(|value| value.to_ascii_lowercase()),
        created_from,
        created_to,
    })
}

fn normalize_filter(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
