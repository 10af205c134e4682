use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{error, info};

use x402_types::AgentProfile;

#[derive(Debug, Clone)]
pub enum AgentRepositoryError {
    AlreadyRegistered(String),
    NotFound(String),
}

impl std::fmt::Display for AgentRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRepositoryError::AlreadyRegistered(msg) => write!(f, "{msg}"),
            AgentRepositoryError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AgentRepositoryError {}

/// JSON-file-backed agent registry. Loads tolerantly at startup (missing
/// file -> empty, malformed JSON -> empty, per-record validation errors are
/// skipped individually) and persists atomically via a temp-file-then-
/// rename.
pub struct AgentRepository {
    file_path: PathBuf,
    agents: Mutex<HashMap<String, AgentProfile>>,
}

impl AgentRepository {
    pub async fn new(file_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let file_path = file_path.into();
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let agents = load_agents(&file_path).await;
        info!(count = agents.len(), path = %file_path.display(), "loaded agent registry");
        Ok(Self {
            file_path,
            agents: Mutex::new(agents),
        })
    }

    pub async fn create_agent(&self, profile: AgentProfile) -> Result<(), AgentRepositoryError> {
        let mut agents = self.agents.lock().await;

        for existing in agents.values() {
            if existing.base_url == profile.base_url {
                if existing.agent_id == profile.agent_id {
                    return Err(AgentRepositoryError::AlreadyRegistered(format!(
                        "Agent {} is already registered with this URL.",
                        profile.agent_id
                    )));
                }
                return Err(AgentRepositoryError::AlreadyRegistered(format!(
                    "Base URL {} is already registered by agent {}",
                    profile.base_url, existing.agent_id
                )));
            }
            if !profile.agent_name.is_empty()
                && existing.agent_name == profile.agent_name
                && existing.agent_id != profile.agent_id
            {
                return Err(AgentRepositoryError::AlreadyRegistered(format!(
                    "Agent name '{}' is already taken by agent {}",
                    profile.agent_name, existing.agent_id
                )));
            }
        }

        if agents.contains_key(&profile.agent_id) {
            return Err(AgentRepositoryError::AlreadyRegistered(format!(
                "Agent {} is already registered.",
                profile.agent_id
            )));
        }

        agents.insert(profile.agent_id.clone(), profile);
        save_agents(&self.file_path, &agents).await;
        Ok(())
    }

    pub async fn get_agent(&self, agent_id: &str) -> Option<AgentProfile> {
        self.agents.lock().await.get(agent_id).cloned()
    }

    pub async fn list_agents(&self, limit: usize, offset: usize) -> Vec<AgentProfile> {
        let agents = self.agents.lock().await;
        let mut all: Vec<AgentProfile> = agents.values().cloned().collect();
        all.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        all.into_iter().skip(offset).take(limit).collect()
    }
}

async fn load_agents(file_path: &Path) -> HashMap<String, AgentProfile> {
    if !file_path.exists() {
        info!(path = %file_path.display(), "agents file not found, starting empty");
        return HashMap::new();
    }

    let raw = match tokio::fs::read_to_string(file_path).await {
        Ok(raw) => raw,
        Err(err) => {
            error!(path = %file_path.display(), %err, "error reading agents file");
            return HashMap::new();
        }
    };

    let records: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(records) => records,
        Err(err) => {
            error!(path = %file_path.display(), %err, "invalid JSON in agents file, starting empty");
            return HashMap::new();
        }
    };

    let mut agents = HashMap::new();
    for record in records {
        match serde_json::from_value::<AgentProfile>(record) {
            Ok(profile) => {
                agents.insert(profile.agent_id.clone(), profile);
            }
            Err(err) => {
                error!(%err, "failed to load agent profile, skipping");
            }
        }
    }
    agents
}

async fn save_agents(file_path: &Path, agents: &HashMap<String, AgentProfile>) {
    let list: Vec<&AgentProfile> = agents.values().collect();
    let payload = match serde_json::to_vec_pretty(&list) {
        Ok(payload) => payload,
        Err(err) => {
            error!(%err, "failed to serialize agent registry");
            return;
        }
    };

    let temp_path = file_path.with_extension("tmp");
    if let Err(err) = tokio::fs::write(&temp_path, &payload).await {
        error!(%err, "failed to write temp agents file");
        return;
    }
    if let Err(err) = tokio::fs::rename(&temp_path, file_path).await {
        error!(%err, "failed to rename temp agents file into place");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("x402-registry-test-{}.json", Uuid::new_v4()))
    }

    fn sample_profile(agent_id: &str, base_url: &str, name: &str) -> AgentProfile {
        let now = chrono::Utc::now();
        AgentProfile {
            agent_id: agent_id.to_string(),
            agent_name: name.to_string(),
            base_url: base_url.to_string(),
            description: "test agent".to_string(),
            tags: vec![],
            version: 1,
            registered_at: now,
            last_updated_at: now,
        }
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let repo = AgentRepository::new(temp_path()).await.unwrap();
        assert!(repo.list_agents(100, 0).await.is_empty());
    }

    #[tokio::test]
    async fn rejects_duplicate_base_url_from_different_agent() {
        let repo = AgentRepository::new(temp_path()).await.unwrap();
        repo.create_agent(sample_profile("a1", "https://a.example.com", "A"))
            .await
            .unwrap();

        let err = repo
            .create_agent(sample_profile("a2", "https://a.example.com", "B"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentRepositoryError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn rejects_duplicate_agent_name() {
        let repo = AgentRepository::new(temp_path()).await.unwrap();
        repo.create_agent(sample_profile("a1", "https://a.example.com", "Shared"))
            .await
            .unwrap();

        let err = repo
            .create_agent(sample_profile("a2", "https://b.example.com", "Shared"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentRepositoryError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn rejects_duplicate_agent_id() {
        let repo = AgentRepository::new(temp_path()).await.unwrap();
        repo.create_agent(sample_profile("a1", "https://a.example.com", "A"))
            .await
            .unwrap();

        let err = repo
            .create_agent(sample_profile("a1", "https://b.example.com", "B"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentRepositoryError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn persists_across_reload() {
        let path = temp_path();
        {
            let repo = AgentRepository::new(&path).await.unwrap();
            repo.create_agent(sample_profile("a1", "https://a.example.com", "A"))
                .await
                .unwrap();
        }

        let reloaded = AgentRepository::new(&path).await.unwrap();
        assert!(reloaded.get_agent("a1").await.is_some());
    }

    #[tokio::test]
    async fn list_agents_sorted_by_registration_time_descending() {
        let repo = AgentRepository::new(temp_path()).await.unwrap();
        let mut first = sample_profile("a1", "https://a.example.com", "A");
        first.registered_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        repo.create_agent(first).await.unwrap();
        repo.create_agent(sample_profile("a2", "https://b.example.com", "B"))
            .await
            .unwrap();

        let listed = repo.list_agents(100, 0).await;
        assert_eq!(listed[0].agent_id, "a2");
        assert_eq!(listed[1].agent_id, "a1");
    }
}
