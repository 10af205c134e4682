use async_trait::async_trait;
use x402_types::{ExecutionFailure, RunOutcome, TaskRequest};

/// The pluggable "agent brain" that actually performs a task. The
/// execution service treats this as opaque — how it interprets
/// `task_description` and `context`, and what tools it calls along the way,
/// is entirely up to the implementation.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, request: &TaskRequest) -> Result<RunOutcome, ExecutionFailure>;
}

/// A runner that always fails, useful for exercising the failure path in
/// tests and for a `seller-node` started without a real brain configured.
pub struct UnconfiguredRunner;

#[async_trait]
impl TaskRunner for UnconfiguredRunner {
    async fn run(&self, _request: &TaskRequest) -> Result<RunOutcome, ExecutionFailure> {
        Err(ExecutionFailure {
            message: "no task runner configured".to_string(),
            kind: "RuntimeError".to_string(),
        })
    }
}
