use std::net::SocketAddr;
use std::time::Duration;

use axum::http::Method;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use x402_payments::RoutePaymentState;

use crate::handlers::{execute, health, openapi_doc, pricing, task_status};
use crate::middleware::rate_limit_gate;
use crate::state::AppState;

/// Builds the per-route payment state for `payment_gate`, scoped to one
/// route's operation id. Axum runs `route_layer` middleware after routing
/// has matched a path, so the route's operation id can be baked in here
/// rather than recovered from the request later — this is what gives REST
/// routes their fixed operation id (spec.md §4.4's "framework's
/// route-level operation_id"). Pass `None` for routes with no fixed id
/// (e.g. a generic MCP endpoint); `payment_gate` then falls back to
/// peeking the request body.
fn route_payment_state(state: &AppState, operation_id: Option<&str>) -> RoutePaymentState {
    RoutePaymentState {
        payments: state.payments.clone(),
        operation_id: operation_id.map(str::to_string),
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    Router::new()
        .route(
            "/execute",
            post(execute).route_layer(middleware::from_fn_with_state(
                route_payment_state(&state, Some("execute")),
                x402_payments::payment_gate,
            )),
        )
        .route(
            "/tasks/{task_id}",
            get(task_status).route_layer(middleware::from_fn_with_state(
                route_payment_state(&state, None),
                x402_payments::payment_gate,
            )),
        )
        .route("/pricing", get(pricing))
        .route("/health", get(health))
        .route("/doc", get(openapi_doc))
        .layer(cors)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_gate))
        .with_state(state)
}

/// Default janitor sweep interval (spec.md §4.3/§6), used when the caller
/// doesn't configure one.
pub const DEFAULT_JANITOR_INTERVAL_SECONDS: u64 = 600;

pub async fn serve(addr: SocketAddr, state: AppState, janitor_interval: Duration) -> anyhow::Result<()> {
    let janitor = x402_core::spawn_janitor(state.repository.clone(), janitor_interval);

    let app = app_router(state.clone());
    let listener = TcpListener::bind(addr).await?;
    info!("seller node listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    janitor.abort();
    state.execution.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
