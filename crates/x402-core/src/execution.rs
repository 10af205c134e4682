use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::Level;

use x402_observability::{emit_event, ObservabilityEvent, ProcessKind};
use x402_types::{Task, TaskError, TaskRequest};

use crate::repository::TaskRepository;
use crate::runner::TaskRunner;

/// Drives the async create-then-poll pattern: `create_task` starts a
/// background worker and returns immediately with the initial
/// `in_progress` snapshot, without waiting for the runner to make any
/// progress.
pub struct ExecutionService {
    repository: Arc<TaskRepository>,
    runner: Arc<dyn TaskRunner>,
    workers: Mutex<JoinSet<()>>,
}

impl ExecutionService {
    pub fn new(repository: Arc<TaskRepository>, runner: Arc<dyn TaskRunner>) -> Self {
        Self {
            repository,
            runner,
            workers: Mutex::new(JoinSet::new()),
        }
    }

    pub fn repository(&self) -> &Arc<TaskRepository> {
        &self.repository
    }

    pub async fn create_task(
        &self,
        request: TaskRequest,
        deadline_seconds: Option<i64>,
    ) -> Task {
        let task = self.repository.create(request.clone(), deadline_seconds).await;
        emit_event(
            Level::INFO,
            ProcessKind::Seller,
            ObservabilityEvent {
                event: "task_created",
                component: "execution",
                task_id: Some(&task.task_id),
                agent_id: None,
                status: Some("in_progress"),
                error_code: None,
                detail: None,
            },
        );

        let repository = self.repository.clone();
        let runner = self.runner.clone();
        let task_id = task.task_id.clone();
        self.workers.lock().await.spawn(async move {
            run_and_record(repository, runner, task_id, request).await;
        });

        task
    }

    /// Aborts any workers still running. Called during graceful shutdown;
    /// in-flight tasks are left in whatever state the repository holds.
    pub async fn shutdown(&self) {
        self.workers.lock().await.shutdown().await;
    }
}

async fn run_and_record(
    repository: Arc<TaskRepository>,
    runner: Arc<dyn TaskRunner>,
    task_id: String,
    request: TaskRequest,
) {
    let start = Utc::now();
    match runner.run(&request).await {
        Ok(outcome) => {
            let elapsed_ms = (Utc::now() - start).num_milliseconds();
            emit_event(
                Level::INFO,
                ProcessKind::Seller,
                ObservabilityEvent {
                    event: "task_completed",
                    component: "execution",
                    task_id: Some(&task_id),
                    agent_id: None,
                    status: Some("done"),
                    error_code: None,
                    detail: None,
                },
            );
            repository
                .update_success(&task_id, outcome.data, outcome.tools_used, elapsed_ms)
                .await;
        }
        Err(failure) => {
            let elapsed_ms = (Utc::now() - start).num_milliseconds();
            emit_event(
                Level::ERROR,
                ProcessKind::Seller,
                ObservabilityEvent {
                    event: "task_failed",
                    component: "execution",
                    task_id: Some(&task_id),
                    agent_id: None,
                    status: Some("failed"),
                    error_code: Some(&failure.kind),
                    detail: Some(&failure.message),
                },
            );
            repository
                .update_failure(
                    &task_id,
                    TaskError {
                        message: failure.message,
                        kind: failure.kind,
                    },
                    elapsed_ms,
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use x402_types::{ExecutionFailure, RunOutcome, TaskStatus};

    struct EchoRunner;

    #[async_trait]
    impl TaskRunner for EchoRunner {
        async fn run(&self, request: &TaskRequest) -> Result<RunOutcome, ExecutionFailure> {
            Ok(RunOutcome {
                data: json!({"echo": request.task_description}),
                tools_used: vec!["noop".to_string()],
            })
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl TaskRunner for FailingRunner {
        async fn run(&self, _request: &TaskRequest) -> Result<RunOutcome, ExecutionFailure> {
            Err(ExecutionFailure {
                message: "boom".to_string(),
                kind: "ValueError".to_string(),
            })
        }
    }

    fn sample_request() -> TaskRequest {
        TaskRequest {
            task_description: "hello".to_string(),
            context: None,
            secrets: None,
        }
    }

    #[tokio::test]
    async fn create_task_returns_in_progress_before_worker_finishes() {
        let repository = Arc::new(TaskRepository::new(300));
        let service = ExecutionService::new(repository, Arc::new(EchoRunner));

        let task = service.create_task(sample_request(), None).await;
        assert_eq!(task.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn successful_run_marks_task_done() {
        let repository = Arc::new(TaskRepository::new(300));
        let service = ExecutionService::new(repository.clone(), Arc::new(EchoRunner));

        let task = service.create_task(sample_request(), None).await;
        // Give the spawned worker a chance to run.
        for _ in 0..50 {
            if let Some(t) = repository.get(&task.task_id, &task.buyer_secret).await {
                if t.status != TaskStatus::InProgress {
                    assert_eq!(t.status, TaskStatus::Done);
                    assert_eq!(t.result.unwrap()["echo"], "hello");
                    return;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("task never completed");
    }

    #[tokio::test]
    async fn failing_runner_marks_task_failed() {
        let repository = Arc::new(TaskRepository::new(300));
        let service = ExecutionService::new(repository.clone(), Arc::new(FailingRunner));

        let task = service.create_task(sample_request(), None).await;
        for _ in 0..50 {
            if let Some(t) = repository.get(&task.task_id, &task.buyer_secret).await {
                if t.status != TaskStatus::InProgress {
                    assert_eq!(t.status, TaskStatus::Failed);
                    assert_eq!(t.error.unwrap().message, "boom");
                    return;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("task never completed");
    }
}
