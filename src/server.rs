//! HTTP record API over the ship store.

pub mod handlers;
pub mod models;

use crate::config::ServerConfig;
use crate::storage::ShipStore;
use axum::http::Method;
use axum::routing::get;
use axum::Router;
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared per-request state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ShipStore>,
    pub environment: String,
    pub testing: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn ShipStore>, config: &ServerConfig) -> Self {
        Self {
            store,
            environment: config.environment.clone(),
            testing: config.testing,
        }
    }
}

/// Create the router with every route and layer attached
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::prometheus))
        .route("/ships", get(handlers::list_ships).post(handlers::create_ship))
        .route(
            "/ships/:id",
            get(handlers::get_ship)
                .put(handlers::update_ship)
                .delete(handlers::delete_ship),
        )
        .route("/ships/type/:ship_type", get(handlers::ships_by_type))
        .route(
            "/ships/reporting-period/:reporting_period",
            get(handlers::ships_by_reporting_period),
        )
        .route(
            "/ships/stats/efficiency-by-type",
            get(handlers::efficiency_by_type),
        )
        .route("/ships/stats/summary", get(handlers::date_range_summary))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Serve the API until ctrl-c
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server listening on http://{}", addr);
    info!("Health check: http://localhost:{}/health", port);

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
