//! Semantic-search collaborator (spec §6). The core never ranks anything
//! itself (spec §1 Non-goals) — it only consumes the ordered ID list.

use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchHit {
    pub user_id: i64,
    pub score: f32,
}

#[async_trait]
pub trait SemanticSearch: Send + Sync {
    async fn search(&self, query_text: &str, exclude_ids: &[i64], limit: usize) -> Result<Vec<SearchHit>, String>;
}

pub struct HttpSemanticSearch {
    client: reqwest::Client,
    base_url: String,
    deadline: Duration,
}

impl HttpSemanticSearch {
    pub fn from_env(deadline: Duration) -> Result<Self, String> {
        let base_url = std::env::var("VECTOR_SEARCH_BASE_URL")
            .map_err(|_| "VECTOR_SEARCH_BASE_URL not set".to_string())?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            deadline,
        })
    }
}

#[async_trait]
impl SemanticSearch for HttpSemanticSearch {
    async fn search(&self, query_text: &str, exclude_ids: &[i64], limit: usize) -> Result<Vec<SearchHit>, String> {
        let response = tokio::time::timeout(
            self.deadline,
            self.client
                .post(format!("{}/v1/search", self.base_url))
                .json(&serde_json::json!({
                    "query": query_text,
                    "exclude_ids": exclude_ids,
                    "limit": limit,
                }))
                .send(),
        )
        .await
        .map_err(|_| "vector search deadline exceeded".to_string())?
        .map_err(|e| e.to_string())?;

        response.json::<Vec<SearchHit>>().await.map_err(|e| e.to_string())
    }
}

#[cfg(test)]
pub mod fakes {
    use super::*;

    pub struct FixedSearch(pub Vec<SearchHit>);

    #[async_trait]
    impl SemanticSearch for FixedSearch {
        async fn search(&self, _query_text: &str, exclude_ids: &[i64], limit: usize) -> Result<Vec<SearchHit>, String> {
            Ok(self
                .0
                .iter()
                .filter(|h| !exclude_ids.contains(&h.user_id))
                .take(limit)
                .cloned()
                .collect())
        }
    }
}
