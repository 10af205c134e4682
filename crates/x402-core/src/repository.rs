use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use x402_types::{Task, TaskError, TaskRequest, TaskStatus};

/// Default deadline applied to a task when the request doesn't override it,
/// mirroring `ExecutionService(default_deadline_seconds=300)`.
pub const DEFAULT_DEADLINE_SECONDS: i64 = 300;

/// In-memory store for tasks in flight. Every operation takes the same
/// mutex, so critical sections are kept short and non-blocking.
pub struct TaskRepository {
    tasks: Mutex<HashMap<String, Task>>,
    default_deadline_seconds: i64,
    reject_terminal_overwrite: bool,
}

impl TaskRepository {
    pub fn new(default_deadline_seconds: i64) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            default_deadline_seconds,
            reject_terminal_overwrite: false,
        }
    }

    /// Opts into rejecting updates to a task that has already reached a
    /// terminal status, instead of the default last-writer-wins behavior.
    pub fn with_reject_terminal_overwrite(mut self, reject: bool) -> Self {
        self.reject_terminal_overwrite = reject;
        self
    }

    pub async fn create(&self, request: TaskRequest, deadline_seconds: Option<i64>) -> Task {
        let task = Task::new(
            request,
            deadline_seconds.unwrap_or(self.default_deadline_seconds),
        );
        info!(task_id = %task.task_id, expires_at = %task.expires_at, "created task");
        self.tasks
            .lock()
            .await
            .insert(task.task_id.clone(), task.clone());
        task
    }

    /// Returns `None` both when the task id is unknown and when the secret
    /// doesn't match — intentionally indistinguishable so a guessing
    /// attacker can't learn which task ids exist.
    pub async fn get(&self, task_id: &str, buyer_secret: &str) -> Option<Task> {
        let tasks = self.tasks.lock().await;
        let task = tasks.get(task_id)?;
        if task.buyer_secret != buyer_secret {
            debug!(task_id, "get_task: buyer_secret mismatch");
            return None;
        }
        Some(task.clone())
    }

    pub async fn update_success(
        &self,
        task_id: &str,
        result: serde_json::Value,
        tools_used: Vec<String>,
        execution_time_ms: i64,
    ) {
        self.apply_update(task_id, TaskStatus::Done, Some(result), None, tools_used, execution_time_ms)
            .await;
    }

    pub async fn update_failure(&self, task_id: &str, error: TaskError, execution_time_ms: i64) {
        self.apply_update(
            task_id,
            TaskStatus::Failed,
            None,
            Some(error),
            Vec::new(),
            execution_time_ms,
        )
        .await;
    }

    async fn apply_update(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<TaskError>,
        tools_used: Vec<String>,
        execution_time_ms: i64,
    ) {
        let mut tasks = self.tasks.lock().await;
        let Some(task) = tasks.get_mut(task_id) else {
            // Silent no-op on an unknown id, matching the source repository.
            return;
        };
        if self.reject_terminal_overwrite && task.status.is_terminal() {
            debug!(task_id, "update_task: rejected overwrite of terminal task");
            return;
        }
        task.status = status;
        task.result = result;
        task.error = error;
        task.tools_used = tools_used;
        task.execution_time_ms = Some(execution_time_ms);
        info!(task_id, status = ?status, "updated task");
    }

    /// Marks any `in_progress` task whose deadline has passed as `failed`.
    /// Returns the number of tasks swept.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut tasks = self.tasks.lock().await;
        let mut swept = 0;
        for task in tasks.values_mut() {
            if task.status == TaskStatus::InProgress && now >= task.expires_at {
                task.status = TaskStatus::Failed;
                task.error = Some(TaskError {
                    message: "Task deadline exceeded".to_string(),
                    kind: "DeadlineExceeded".to_string(),
                });
                swept += 1;
                info!(task_id = %task.task_id, "task marked failed: deadline exceeded");
            }
        }
        swept
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x402_types::TaskRequest;

    fn sample_request() -> TaskRequest {
        TaskRequest {
            task_description: "summarize the news".to_string(),
            context: None,
            secrets: None,
        }
    }

    #[tokio::test]
    async fn get_task_hides_unknown_id_and_wrong_secret_identically() {
        let repo = TaskRepository::new(300);
        let task = repo.create(sample_request(), None).await;

        assert!(repo.get("not-a-real-id", &task.buyer_secret).await.is_none());
        assert!(repo.get(&task.task_id, "wrong-secret").await.is_none());
        assert!(repo.get(&task.task_id, &task.buyer_secret).await.is_some());
    }

    #[tokio::test]
    async fn update_after_completion_overwrites_by_default() {
        let repo = TaskRepository::new(300);
        let task = repo.create(sample_request(), None).await;

        repo.update_success(&task.task_id, serde_json::json!({"result": "a"}), vec![], 10)
            .await;
        repo.update_success(&task.task_id, serde_json::json!({"result": "b"}), vec![], 20)
            .await;

        let fetched = repo.get(&task.task_id, &task.buyer_secret).await.unwrap();
        assert_eq!(fetched.result.unwrap()["result"], "b");
    }

    #[tokio::test]
    async fn reject_terminal_overwrite_keeps_first_result() {
        let repo = TaskRepository::new(300).with_reject_terminal_overwrite(true);
        let task = repo.create(sample_request(), None).await;

        repo.update_success(&task.task_id, serde_json::json!({"result": "a"}), vec![], 10)
            .await;
        repo.update_success(&task.task_id, serde_json::json!({"result": "b"}), vec![], 20)
            .await;

        let fetched = repo.get(&task.task_id, &task.buyer_secret).await.unwrap();
        assert_eq!(fetched.result.unwrap()["result"], "a");
    }

    #[tokio::test]
    async fn sweep_expired_marks_deadline_exceeded() {
        let repo = TaskRepository::new(-1);
        let task = repo.create(sample_request(), Some(-1)).await;

        let swept = repo.sweep_expired().await;
        assert_eq!(swept, 1);

        let fetched = repo.get(&task.task_id, &task.buyer_secret).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::Failed);
        assert_eq!(fetched.error.unwrap().kind, "DeadlineExceeded");
    }

    #[tokio::test]
    async fn sweep_expired_ignores_already_terminal_tasks() {
        let repo = TaskRepository::new(-1);
        let task = repo.create(sample_request(), Some(-1)).await;
        repo.update_success(&task.task_id, serde_json::json!({}), vec![], 5)
            .await;

        let swept = repo.sweep_expired().await;
        assert_eq!(swept, 0);
    }
}
