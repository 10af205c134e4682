use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for `POST /register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistrationRequest {
    pub agent_name: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    pub base_url: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Persisted/returned agent profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: String,
    #[serde(default)]
    pub agent_name: String,
    pub base_url: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_version")]
    pub version: u32,
    pub registered_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl AgentProfile {
    pub fn from_registration(request: AgentRegistrationRequest) -> Self {
        let now = Utc::now();
        let agent_id = request
            .agent_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            agent_id,
            agent_name: request.agent_name,
            base_url: request.base_url,
            description: request.description,
            tags: request.tags,
            version: 1,
            registered_at: now,
            last_updated_at: now,
        }
    }

    /// Ported from `validate_https_url`: requires HTTPS, except for
    /// loopback/intranet/`.local` hosts during local development.
    pub fn validate_base_url(url: &str) -> bool {
        let Ok(parsed) = url::Url::parse(url) else {
            return false;
        };
        let host = parsed.host_str().unwrap_or("");
        if parsed.scheme() == "http" {
            let is_loopback_or_intranet = matches!(host, "localhost" | "127.0.0.1" | "0.0.0.0")
                || (!host.is_empty() && !host.contains('.'))
                || host.ends_with(".local");
            return is_loopback_or_intranet && !host.is_empty();
        }
        parsed.scheme() == "https" && !host.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub status: String,
    pub agent_id: String,
    pub version: u32,
}

impl RegistrationResponse {
    pub fn from_profile(profile: &AgentProfile) -> Self {
        Self {
            status: "success".to_string(),
            agent_id: profile.agent_id.clone(),
            version: profile.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https() {
        assert!(AgentProfile::validate_base_url("https://agent.example.com"));
    }

    #[test]
    fn rejects_plain_http_public_host() {
        assert!(!AgentProfile::validate_base_url("http://agent.example.com"));
    }

    #[test]
    fn accepts_http_localhost() {
        assert!(AgentProfile::validate_base_url("http://localhost:8080"));
    }

    #[test]
    fn accepts_http_docker_service_name() {
        assert!(AgentProfile::validate_base_url("http://seller-agent:8000"));
    }

    #[test]
    fn accepts_http_dot_local() {
        assert!(AgentProfile::validate_base_url("http://agent.local"));
    }
}
