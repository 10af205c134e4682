use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::repository::TaskRepository;

/// Periodically sweeps expired tasks. Runs as a background `tokio::spawn`
/// loop for the lifetime of the process; the returned handle is aborted on
/// shutdown.
pub fn spawn_janitor(repository: Arc<TaskRepository>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let swept = repository.sweep_expired().await;
            if swept > 0 {
                info!(swept, "janitor swept expired tasks");
            } else {
                debug!("janitor sweep: nothing expired");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use x402_types::{TaskRequest, TaskStatus};

    #[tokio::test]
    async fn janitor_sweeps_expired_tasks_on_a_tick() {
        let repository = Arc::new(TaskRepository::new(-1));
        let task = repository
            .create(
                TaskRequest {
                    task_description: "x".to_string(),
                    context: None,
                    secrets: None,
                },
                Some(-1),
            )
            .await;

        let handle = spawn_janitor(repository.clone(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        let fetched = repository.get(&task.task_id, &task.buyer_secret).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::Failed);
    }
}
