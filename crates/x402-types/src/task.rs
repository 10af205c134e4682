use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Execution request a Buyer sends to `/execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_description: String,
    #[serde(default)]
    pub context: Option<HashMap<String, Value>>,
    /// Sensitive data (API keys, credentials). Never logged or persisted.
    #[serde(default)]
    pub secrets: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskError {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Internal record held by the task repository. `buyer_secret` acts as a
/// capability token: holding it is the only thing that authorizes reading
/// this task's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub buyer_secret: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub request: TaskRequest,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<TaskError>,
    #[serde(default)]
    pub execution_time_ms: Option<i64>,
    #[serde(default)]
    pub tools_used: Vec<String>,
}

impl Task {
    pub fn new(request: TaskRequest, deadline_seconds: i64) -> Self {
        let created_at = Utc::now();
        Self {
            task_id: Uuid::new_v4().to_string(),
            buyer_secret: Uuid::new_v4().to_string(),
            status: TaskStatus::InProgress,
            created_at,
            expires_at: created_at + chrono::Duration::seconds(deadline_seconds),
            request,
            result: None,
            error: None,
            execution_time_ms: None,
            tools_used: Vec::new(),
        }
    }

    /// Maps the internal record to the wire shape returned from `/execute`
    /// and `/tasks/{task_id}`.
    pub fn to_execution_result(&self) -> ExecutionResult {
        let mut data = self.result.clone().unwrap_or_else(|| Value::Object(Default::default()));
        if let Value::Object(ref mut map) = data {
            if !map.contains_key("tools_used") {
                map.insert(
                    "tools_used".to_string(),
                    serde_json::to_value(&self.tools_used).unwrap_or(Value::Null),
                );
            }
        }
        ExecutionResult {
            task_id: self.task_id.clone(),
            buyer_secret: self.buyer_secret.clone(),
            status: self.status,
            data,
            execution_time_ms: self.execution_time_ms,
            error: self.error.clone(),
            created_at: self.created_at,
            deadline_at: Some(self.expires_at),
        }
    }
}

/// Wire shape returned to Buyers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub task_id: String,
    pub buyer_secret: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub data: Value,
    pub execution_time_ms: Option<i64>,
    pub error: Option<TaskError>,
    pub created_at: DateTime<Utc>,
    pub deadline_at: Option<DateTime<Utc>>,
}

/// Outcome a `TaskRunner` hands back to the execution service on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub data: Value,
    #[serde(default)]
    pub tools_used: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ExecutionFailure {
    pub message: String,
    pub kind: String,
}

impl std::fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ExecutionFailure {}
