use serde::{Deserialize, Serialize};

/// The seller node's error taxonomy, shared by every middleware and handler
/// so callers get one consistent wire shape regardless of which layer
/// rejected the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ValidationError,
    /// Wire code is `TASK_NOT_FOUND`, not the SCREAMING_SNAKE_CASE default
    /// (`NOT_FOUND`) — the 404 on `/tasks/{task_id}` is specifically a
    /// missing-or-unauthorized task, not a generic not-found.
    #[serde(rename = "TASK_NOT_FOUND")]
    NotFound,
    Unauthorized,
    PaymentRequired,
    PaymentVerifyUnavailable,
    /// Wire code is `RATE_LIMIT_EXCEEDED`, not the default `RATE_LIMITED`.
    #[serde(rename = "RATE_LIMIT_EXCEEDED")]
    RateLimited,
    ExecutionFailed,
    DeadlineExceeded,
    RegistrationError,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::ValidationError => 422,
            ErrorKind::NotFound => 404,
            ErrorKind::Unauthorized => 401,
            ErrorKind::PaymentRequired | ErrorKind::PaymentVerifyUnavailable => 402,
            ErrorKind::RateLimited => 429,
            ErrorKind::ExecutionFailed | ErrorKind::DeadlineExceeded => 500,
            ErrorKind::RegistrationError => 502,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }
}

/// Wire body for every non-2xx response this node emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_code: ErrorKind,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(error_code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error_code,
            message: message.into(),
        }
    }
}
