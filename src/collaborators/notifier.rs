//! SMS / email / push notifier collaborator (spec §6).
//!
//! A narrow async trait with a single production implementation configured
//! from the environment, substitutable by a fake in tests.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a templated notification. `idempotency_key` lets the transport
    /// dedupe retried sends; the notifier's own responsibility per spec §6.
    async fn send(
        &self,
        destination: &str,
        template_id: &str,
        variables: &[(&str, &str)],
        idempotency_key: &str,
    ) -> Result<bool, String>;
}

/// HTTP-backed notifier calling an upstream provider's REST API.
pub struct HttpNotifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    deadline: Duration,
}

impl HttpNotifier {
    pub fn from_env(deadline: Duration) -> Result<Self, String> {
        let base_url = std::env::var("NOTIFIER_BASE_URL")
            .map_err(|_| "NOTIFIER_BASE_URL not set".to_string())?;
        let api_key = std::env::var("NOTIFIER_API_KEY")
            .map_err(|_| "NOTIFIER_API_KEY not set".to_string())?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            deadline,
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(
        &self,
        destination: &str,
        template_id: &str,
        variables: &[(&str, &str)],
        idempotency_key: &str,
    ) -> Result<bool, String> {
        let body = serde_json::json!({
            "destination": destination,
            "template_id": template_id,
            "variables": variables.iter().cloned().collect::<std::collections::HashMap<_, _>>(),
            "idempotency_key": idempotency_key,
        });

        let response = tokio::time::timeout(
            self.deadline,
            self.client
                .post(format!("{}/v1/notifications", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| "notifier deadline exceeded".to_string())?
        .map_err(|e| e.to_string())?;

        #[derive(serde::Deserialize)]
        struct Accepted {
            accepted: bool,
        }

        let accepted: Accepted = response.json().await.map_err(|e| e.to_string())?;
        Ok(accepted.accepted)
    }
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(
            &self,
            destination: &str,
            template_id: &str,
            _variables: &[(&str, &str)],
            _idempotency_key: &str,
        ) -> Result<bool, String> {
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), template_id.to_string()));
            Ok(true)
        }
    }
}
