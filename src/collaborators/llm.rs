//! LLM-like classifier/answerer collaborator (spec §6), speaking to an
//! OpenAI-compatible chat-completions endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResult {
    pub intent: String,
    pub confidence: f32,
    pub reasoning: String,
}

#[async_trait]
pub trait LlmCollaborator: Send + Sync {
    async fn classify(&self, text: &str, context: &str) -> Result<ClassifyResult, String>;
    async fn answer(&self, question: &str, grounding_docs: &[String]) -> Result<String, String>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

pub struct HttpLlmCollaborator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    deadline: Duration,
}

impl HttpLlmCollaborator {
    pub fn from_env(deadline: Duration) -> Result<Self, String> {
        let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("LLM_API_KEY").map_err(|_| "LLM_API_KEY not set".to_string())?;
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
            deadline,
        })
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system.to_string() },
                ChatMessage { role: "user", content: user },
            ],
            temperature: 0.0,
        };

        let response = tokio::time::timeout(
            self.deadline,
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| "llm deadline exceeded".to_string())?
        .map_err(|e| e.to_string())?;

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| e.to_string())?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| "empty completion".to_string())
    }
}

#[async_trait]
impl LlmCollaborator for HttpLlmCollaborator {
    async fn classify(&self, text: &str, context: &str) -> Result<ClassifyResult, String> {
        let raw = self
            .complete(
                "Classify the utterance as search, inquiry, or casual. Respond as JSON: {\"intent\":...,\"confidence\":...,\"reasoning\":...}",
                format!("utterance: {text}\ncontext: {context}"),
            )
            .await?;
        serde_json::from_str(&raw).map_err(|e| format!("malformed classifier output: {e}"))
    }

    async fn answer(&self, question: &str, grounding_docs: &[String]) -> Result<String, String> {
        let docs = grounding_docs.join("\n---\n");
        self.complete(
            "Answer the question using only the provided grounding documents.",
            format!("question: {question}\ndocuments:\n{docs}"),
        )
        .await
    }
}

#[cfg(test)]
pub mod fakes {
    use super::*;

    pub struct FixedLlm {
        pub classify_result: ClassifyResult,
        pub answer_text: String,
    }

    #[async_trait]
    impl LlmCollaborator for FixedLlm {
        async fn classify(&self, _text: &str, _context: &str) -> Result<ClassifyResult, String> {
            Ok(self.classify_result.clone())
        }

        async fn answer(&self, _question: &str, _grounding_docs: &[String]) -> Result<String, String> {
            Ok(self.answer_text.clone())
        }
    }
}
