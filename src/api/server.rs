//! HTTP server implementation for the plan store API

use std::future::Future;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, ETAG, IF_MATCH, IF_NONE_MATCH, LOCATION},
        Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{auth, handlers};
use crate::core::app_state::SharedState;
use crate::core::error::Result;

/// Creates the main application router with all routes and middleware
pub fn create_app(state: SharedState) -> Router {
    let server = &state.config.server;

    // Plan and admin routes require a principal
    let protected = Router::new()
        .route(
            "/api/v1/plans",
            post(handlers::create_plan).get(handlers::list_plans),
        )
        .route(
            "/api/v1/plans/:id",
            get(handlers::get_plan)
                .put(handlers::replace_plan)
                .patch(handlers::patch_plan)
                .delete(handlers::delete_plan),
        )
        .route("/api/v1/admin/orphans/collect", post(handlers::collect_orphans))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_principal,
        ));

    let mut app = Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_check))
        .route("/info", get(handlers::system_info))
        .merge(protected);

    if state.config.metrics.enabled {
        app = app.route("/metrics", get(handlers::metrics));
    }

    let app = app
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .layer(TraceLayer::new_for_http());

    let app = if server.enable_cors {
        let cors = CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([CONTENT_TYPE, AUTHORIZATION, IF_MATCH, IF_NONE_MATCH])
            .expose_headers([ETAG, LOCATION])
            .allow_origin(Any);
        app.layer(ServiceBuilder::new().layer(cors))
    } else {
        app
    };

    app.with_state(state)
}

/// Start the HTTP server and run until `shutdown` resolves
pub async fn start_server<F>(state: SharedState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.server.http_addr;
    tracing::info!("Starting planstore API server on {}", addr);

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Health check available at http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
