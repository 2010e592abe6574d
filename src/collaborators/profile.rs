//! Profile-store collaborator (spec §6). Profile CRUD itself is explicitly
//! out of scope (spec §1); the core only needs read access to ground the
//! inquiry-routed dispatcher.

use async_trait::async_trait;
use std::time::Duration;

pub type ProfileDocument = serde_json::Value;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: i64) -> Result<Option<ProfileDocument>, String>;
    async fn current_user_profile(&self, user_id: i64) -> Result<Option<ProfileDocument>, String>;
}

pub struct HttpProfileStore {
    client: reqwest::Client,
    base_url: String,
    deadline: Duration,
}

impl HttpProfileStore {
    pub fn from_env(deadline: Duration) -> Result<Self, String> {
        let base_url = std::env::var("PROFILE_STORE_BASE_URL")
            .map_err(|_| "PROFILE_STORE_BASE_URL not set".to_string())?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            deadline,
        })
    }

    async fn fetch(&self, user_id: i64) -> Result<Option<ProfileDocument>, String> {
        let response = tokio::time::timeout(
            self.deadline,
            self.client
                .get(format!("{}/v1/profiles/{}", self.base_url, user_id))
                .send(),
        )
        .await
        .map_err(|_| "profile store deadline exceeded".to_string())?
        .map_err(|e| e.to_string())?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        response.json().await.map(Some).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ProfileStore for HttpProfileStore {
    async fn get_profile(&self, user_id: i64) -> Result<Option<ProfileDocument>, String> {
        self.fetch(user_id).await
    }

    async fn current_user_profile(&self, user_id: i64) -> Result<Option<ProfileDocument>, String> {
        self.fetch(user_id).await
    }
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct InMemoryProfileStore(pub HashMap<i64, ProfileDocument>);

    #[async_trait]
    impl ProfileStore for InMemoryProfileStore {
        async fn get_profile(&self, user_id: i64) -> Result<Option<ProfileDocument>, String> {
            Ok(self.0.get(&user_id).cloned())
        }

        async fn current_user_profile(&self, user_id: i64) -> Result<Option<ProfileDocument>, String> {
            Ok(self.0.get(&user_id).cloned())
        }
    }
}
