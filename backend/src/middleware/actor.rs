//! Resolves the acting user from the identity the fronting session layer
//! attaches to each request, and makes it available to handlers and the audit
//! middleware as a request extension.
//!
//! Authentication itself happens upstream; this crate only trusts the
//! `x-actor-id` header that layer sets after validating the session.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::str::FromStr;

use crate::{error::AppError, repositories::user as user_repo, state::AppState, types::UserId};

const ACTOR_ID_HEADER: &str = "x-actor-id";

pub async fn require_actor(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(actor_id) = extract_actor_id(request.headers()) else {
        return AppError::Unauthorized("Actor context missing".into()).into_response();
    };

    match user_repo::fetch_user(&state.pool, actor_id).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => AppError::Unauthorized("Unknown actor".into()).into_response(),
        Err(err) => AppError::InternalServerError(err.into()).into_response(),
    }
}

fn extract_actor_id(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(ACTOR_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| UserId::from_str(value.trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_actor_id_parses_header() {
        let id = UserId::new();
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_ID_HEADER, id.to_string().parse().unwrap());
        assert_eq!(extract_actor_id(&headers), Some(id));
    }

    #[test]
    fn extract_actor_id_rejects_malformed_values() {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_ID_HEADER, "not-a-uuid".parse().unwrap());
        assert_eq!(extract_actor_id(&headers), None);
        assert_eq!(extract_actor_id(&HeaderMap::new()), None);
    }
}
