use utoipa::OpenApi;

use crate::handlers::admin::audit_events::{
    AuditEventListResponse, AuditEventResponse, PurgeRequest, PurgeResponse,
};
use crate::models::audit_event::AuditStats;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::admin::audit_events::list_audit_events,
        crate::handlers::admin::audit_events::get_audit_stats,
        crate::handlers::admin::audit_events::export_audit_events,
        crate::handlers::admin::audit_events::get_audit_event_detail,
        crate::handlers::admin::audit_events::purge_audit_events,
    ),
    components(schemas(
        AuditEventResponse,
        AuditEventListResponse,
        AuditStats,
        PurgeRequest,
        PurgeResponse,
    )),
    tags(
        (name = "audit-events", description = "Audit trail listing, reporting, and retention")
    )
)]
pub struct ApiDoc;
