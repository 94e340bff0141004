//! The single call-site wrapper for audit recording. Every admin screen is
//! audited here, from the request's method and path shape, instead of each
//! handler calling the recorder ad hoc.
//!
//! Recording happens after the handler finishes, on a detached task, and only
//! for completed (non-error) responses. The purge endpoint is excluded: the
//! purge service records its own `bulk_delete` event.

use axum::{
    extract::{Request, State},
    http::{header::USER_AGENT, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::{
    middleware::request_id::RequestId,
    models::audit_event::{verbs, SubjectRef},
    models::user::User,
    services::audit_log::NewAuditEvent,
    state::AppState,
};

struct AuditEventDescriptor {
    verb: &'static str,
    description: String,
    subject: Option<SubjectRef>,
}

pub async fn audit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let Some(descriptor) = classify_request(&method, &path) else {
        return next.run(request).await;
    };

    let headers = request.headers().clone();
    let actor = request.extensions().get::<User>().cloned();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone());

    let response = next.run(request).await;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        // The action did not complete; there is nothing to record.
        return response;
    }

    let event = NewAuditEvent {
        actor_id: actor.map(|user| user.id),
        verb: descriptor.verb.to_string(),
        description: descriptor.description,
        subject: descriptor.subject,
        metadata: Some(json!({
            "status": status.as_u16(),
            "ip": extract_ip(&headers),
            "user_agent": extract_user_agent(&headers),
            "request_id": request_id,
        })),
    };

    let audit_log = state.audit_log.clone();
    tokio::spawn(async move {
        audit_log.record(event).await;
    });

    response
}

/// Maps an admin request onto an audit verb by its shape:
/// list access, detail view, export, create, update, delete.
fn classify_request(method: &Method, path: &str) -> Option<AuditEventDescriptor> {
    let normalized = path.trim_end_matches('/');
    let segments: Vec<&str> = normalized.trim_start_matches('/').split('/').collect();
    let ["api", "admin", resource, rest @ ..] = segments.as_slice() else {
        return None;
    };
    if is_excluded(&segments) {
        return None;
    }

    let kind = resource.replace('-', "_");

    if *method == Method::GET {
        match rest {
            [] => Some(descriptor(
                verbs::ACCESS,
                format!("Accessed {} list", kind),
                None,
            )),
            ["export"] => Some(descriptor(verbs::EXPORT, format!("Exported {}", kind), None)),
            ["stats"] => Some(descriptor(
                verbs::ACCESS,
                format!("Accessed {} stats", kind),
                None,
            )),
            [id] => Some(descriptor(
                verbs::VIEW,
                format!("Viewed {} {}", kind, id),
                Some(SubjectRef::new(kind.clone(), *id)),
            )),
            _ => None,
        }
    } else if *method == Method::POST {
        match rest {
            [] => Some(descriptor(verbs::CREATE, format!("Created {}", kind), None)),
            _ => None,
        }
    } else if *method == Method::PUT || *method == Method::PATCH {
        match rest {
            [id] => Some(descriptor(
                verbs::UPDATE,
                format!("Updated {} {}", kind, id),
                Some(SubjectRef::new(kind.clone(), *id)),
            )),
            _ => None,
        }
    } else if *method == Method::DELETE {
        match rest {
            [id] => Some(descriptor(
                verbs::DELETE,
                format!("Deleted {} {}", kind, id),
                Some(SubjectRef::new(kind.clone(), *id)),
            )),
            _ => None,
        }
    } else {
        None
    }
}

fn descriptor(
    verb: &'static str,
    description: String,
    subject: Option<SubjectRef>,
) -> AuditEventDescriptor {
    AuditEventDescriptor {
        verb,
        description,
        subject,
    }
}

fn is_excluded(segments: &[&str]) -> bool {
    // The purge emits its own bulk_delete event inside the purge transaction.
    matches!(segments, ["api", "admin", "audit-events", "purge"])
}

fn extract_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').next().unwrap_or(value).trim().to_string())
}

fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}
