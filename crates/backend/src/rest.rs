//! The REST backend: assistant configurations, user secretaries and facts.

use async_trait::async_trait;
use secretary_core::assistant::{AssistantConfig, AssistantStore};
use secretary_core::error::{ConfigurationError, ServiceError};
use secretary_core::ids::{AssistantId, UserId};
use secretary_core::services::FactStore;
use serde::{Deserialize, Serialize};
use crate::http::ServiceClient;

pub struct RestBackend {
    http: ServiceClient,
}

#[derive(Debug, Deserialize)]
struct SecretaryRef {
    assistant_id: AssistantId,
}

#[derive(Debug, Serialize, Deserialize)]
struct FactRecord {
    fact: String,
}

impl RestBackend {
    pub fn new(http: ServiceClient) -> Self {
        Self { http }
    }

    fn assistant_path(id: &AssistantId) -> String {
        format!("/assistants/{id}/")
    }

    fn secretary_path(user_id: &UserId) -> String {
        format!("/users/{user_id}/secretary/")
    }

    fn facts_path(user_id: &UserId) -> String {
        format!("/users/{user_id}/facts/")
    }
}

#[async_trait]
impl AssistantStore for RestBackend {
    async fn get_assistant(&self, id: &AssistantId) -> Result<AssistantConfig, ConfigurationError> {
        let config: AssistantConfig = self.http.get_json(&Self::assistant_path(id), &[]).await?;
        if &config.id != id {
            return Err(ConfigurationError::Malformed(format!(
                "asked for assistant {id}, backend returned {}",
                config.id
            )));
        }
        Ok(config)
    }

    async fn get_user_secretary(&self, user_id: &UserId) -> Result<AssistantId, ConfigurationError> {
        let secretary: SecretaryRef = self.http.get_json(&Self::secretary_path(user_id), &[]).await?;
        Ok(secretary.assistant_id)
    }
}

#[async_trait]
impl FactStore for RestBackend {
    async fn add_fact(&self, user_id: &UserId, fact: &str) -> Result<(), ServiceError> {
        self.http
            .post_unit(&Self::facts_path(user_id), &FactRecord { fact: fact.to_string() })
            .await
    }

    async fn list_facts(&self, user_id: &UserId) -> Result<Vec<String>, ServiceError> {
        let records: Vec<FactRecord> = self.http.get_json(&Self::facts_path(user_id), &[]).await?;
        Ok(records.into_iter().map(|r| r.fact).collect())
    }
}
