use std::time::Duration;

use tracing::Level;

use x402_observability::{emit_event, ObservabilityEvent, ProcessKind};
use x402_types::{AgentRegistrationRequest, RegistrationResponse};

#[derive(Debug, Clone)]
pub struct RegistrationSettings {
    pub enabled: bool,
    pub marketplace_base_url: String,
    pub agent_name: String,
    pub base_url: String,
    pub description: String,
    pub tags: Vec<String>,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
}

/// Registers this seller node with the marketplace on startup, retrying on
/// a fixed delay. A 409 response means another process already registered
/// us and is treated as success, matching `RegistrationService.register`.
pub struct RegistrationClient {
    http: reqwest::Client,
    settings: RegistrationSettings,
}

impl RegistrationClient {
    pub fn new(settings: RegistrationSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    pub async fn register(&self) -> bool {
        if !self.settings.enabled {
            tracing::info!("marketplace registration disabled, skipping");
            return true;
        }

        let body = AgentRegistrationRequest {
            agent_name: self.settings.agent_name.clone(),
            agent_id: None,
            base_url: self.settings.base_url.clone(),
            description: self.settings.description.clone(),
            tags: self.settings.tags.clone(),
        };

        for attempt in 1..=self.settings.retry_attempts {
            let result = self
                .http
                .post(format!("{}/register", self.settings.marketplace_base_url))
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) if response.status().as_u16() == 200 => {
                    let agent_id = response
                        .json::<RegistrationResponse>()
                        .await
                        .map(|r| r.agent_id)
                        .unwrap_or_default();
                    emit_event(
                        Level::INFO,
                        ProcessKind::Seller,
                        ObservabilityEvent {
                            event: "registration_succeeded",
                            component: "registry",
                            task_id: None,
                            agent_id: Some(&agent_id),
                            status: Some("registered"),
                            error_code: None,
                            detail: None,
                        },
                    );
                    return true;
                }
                Ok(response) if response.status().as_u16() == 409 => {
                    emit_event(
                        Level::INFO,
                        ProcessKind::Seller,
                        ObservabilityEvent {
                            event: "registration_succeeded",
                            component: "registry",
                            task_id: None,
                            agent_id: None,
                            status: Some("already_registered"),
                            error_code: None,
                            detail: None,
                        },
                    );
                    return true;
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    emit_event(
                        Level::WARN,
                        ProcessKind::Seller,
                        ObservabilityEvent {
                            event: "registration_attempt_failed",
                            component: "registry",
                            task_id: None,
                            agent_id: None,
                            status: Some("rejected"),
                            error_code: Some(status.as_str()),
                            detail: Some(&body),
                        },
                    );
                }
                Err(err) => {
                    emit_event(
                        Level::WARN,
                        ProcessKind::Seller,
                        ObservabilityEvent {
                            event: "registration_attempt_failed",
                            component: "registry",
                            task_id: None,
                            agent_id: None,
                            status: Some("transport_error"),
                            error_code: None,
                            detail: Some(&err.to_string()),
                        },
                    );
                }
            }

            if attempt < self.settings.retry_attempts {
                tokio::time::sleep(Duration::from_secs(self.settings.retry_delay_seconds)).await;
            }
        }

        emit_event(
            Level::ERROR,
            ProcessKind::Seller,
            ObservabilityEvent {
                event: "registration_exhausted",
                component: "registry",
                task_id: None,
                agent_id: None,
                status: Some("failed"),
                error_code: None,
                detail: Some(&format!("{} attempts", self.settings.retry_attempts)),
            },
        );
        false
    }
}
