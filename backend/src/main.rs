use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

use gradekeeper_backend::{
    config::Config, db::connection::create_pool, docs::ApiDoc, handlers, middleware,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gradekeeper_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database_url = %config.database_url,
        listen_port = config.listen_port,
        time_zone = %config.time_zone,
        audit_retention_days = config.audit_retention_days,
        "Loaded configuration from environment/.env"
    );

    // Initialize database
    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let listen_port = config.listen_port;
    let state = AppState::new(pool, config);

    // Admin routes: actor resolution runs first, then the audit wrapper, so
    // recorded events carry the acting user.
    let admin_routes = Router::new()
        .route(
            "/api/admin/audit-events",
            get(handlers::admin::audit_events::list_audit_events),
        )
        .route(
            "/api/admin/audit-events/stats",
            get(handlers::admin::audit_events::get_audit_stats),
        )
        .route(
            "/api/admin/audit-events/export",
            get(handlers::admin::audit_events::export_audit_events),
        )
        .route(
            "/api/admin/audit-events/{id}",
            get(handlers::admin::audit_events::get_audit_event_detail),
        )
        .route(
            "/api/admin/audit-events/purge",
            post(handlers::admin::audit_events::purge_audit_events),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::audit,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_actor,
        ));

    let app = Router::new()
        .route("/api/health", get(handlers::health::health))
        .route(
            "/api/docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::PUT,
                            Method::DELETE,
                            Method::OPTIONS,
                        ])
                        .allow_headers(Any),
                ),
        )
        .layer(axum_middleware::from_fn(middleware::request_id))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], listen_port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
