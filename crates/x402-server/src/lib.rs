pub mod handlers;
pub mod http;
pub mod middleware;
pub mod state;

pub use http::{app_router, serve};
pub use state::AppState;

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use x402_core::{ExecutionService, TaskRepository, UnconfiguredRunner};
    use x402_payments::{NullFacilitator, PaymentState};
    use x402_ratelimit::RateLimiter;
    use x402_types::PricingConfig;

    use crate::http::app_router;
    use crate::state::AppState;

    fn test_state() -> AppState {
        let repository = Arc::new(TaskRepository::new(300));
        let execution = Arc::new(ExecutionService::new(
            repository.clone(),
            Arc::new(UnconfiguredRunner),
        ));
        AppState {
            repository,
            execution,
            rate_limiter: Arc::new(RateLimiter::new(vec![], 60)),
            payments: PaymentState {
                pricing: PricingConfig::new(),
                facilitator: Arc::new(NullFacilitator),
                payee_wallet_address: "0xdead".to_string(),
                enabled: false,
            },
        }
    }

    fn peer_addr() -> SocketAddr {
        "127.0.0.1:12345".parse().unwrap()
    }

    fn with_peer(mut request: Request<Body>) -> Request<Body> {
        request.extensions_mut().insert(ConnectInfo(peer_addr()));
        request
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let app = app_router(test_state());
        let response = app
            .oneshot(with_peer(
                Request::builder().uri("/health").body(Body::empty()).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn execute_then_poll_round_trips_through_http() {
        let app = app_router(test_state());

        let execute_response = app
            .clone()
            .oneshot(with_peer(
                Request::builder()
                    .method("POST")
                    .uri("/execute")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"task_description": "hello"}).to_string(),
                    ))
                    .unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(execute_response.status(), StatusCode::ACCEPTED);

        let body = axum::body::to_bytes(execute_response.into_body(), usize::MAX)
            .await
            .unwrap();
        let result: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let task_id = result["task_id"].as_str().unwrap().to_string();
        let buyer_secret = result["buyer_secret"].as_str().unwrap().to_string();

        let status_response = app
            .oneshot(with_peer(
                Request::builder()
                    .uri(format!("/tasks/{task_id}"))
                    .header("X-Buyer-Secret", buyer_secret)
                    .body(Body::empty())
                    .unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(status_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn task_status_without_secret_header_is_unprocessable() {
        let app = app_router(test_state());
        let response = app
            .oneshot(with_peer(
                Request::builder()
                    .uri("/tasks/any-id")
                    .body(Body::empty())
                    .unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
