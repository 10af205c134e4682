use std::sync::Arc;

use x402_core::{ExecutionService, TaskRepository};
use x402_payments::PaymentState;
use x402_ratelimit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<TaskRepository>,
    pub execution: Arc<ExecutionService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub payments: PaymentState,
}
