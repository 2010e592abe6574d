//! Intent-Routed Conversational Dispatcher (component L, spec §4.6).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::agent::classifier::IntentClassifier;
use crate::collaborators::llm::LlmCollaborator;
use crate::collaborators::profile::ProfileStore;
use crate::collaborators::search::SemanticSearch;
use crate::error::{Error, Result};

const CONFIDENCE_CLARIFICATION_THRESHOLD: f32 = 0.4;
const RETRY_JITTER_BASE_MS: u64 = 50;
const RETRY_JITTER_SPREAD_MS: u64 = 100;

/// One-shot retry with jitter for a collaborator call (spec §7
/// `UpstreamTimeout`: "retry once with jitter inside handler, then
/// surface"). The closure is called again, unmodified, after a short
/// random delay if the first attempt failed.
async fn retry_once<F, Fut, T>(mut call: F) -> std::result::Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, String>>,
{
    match call().await {
        Ok(value) => Ok(value),
        Err(_) => {
            let jitter_ms = RETRY_JITTER_BASE_MS + rand::rng().random_range(0..RETRY_JITTER_SPREAD_MS);
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
            call().await
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub utterance: String,
    pub referenced_user_ids: Vec<i64>,
    pub caller_id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum DispatchResult {
    Search { hits: Vec<crate::collaborators::search::SearchHit>, rationale: String },
    Inquiry { answer: String },
    Casual { reply: String, suggestions: Vec<String> },
    Clarification { message: String },
}

pub struct Dispatcher {
    classifier: Arc<dyn IntentClassifier>,
    search: Arc<dyn SemanticSearch>,
    profiles: Arc<dyn ProfileStore>,
    llm: Arc<dyn LlmCollaborator>,
}

impl Dispatcher {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        search: Arc<dyn SemanticSearch>,
        profiles: Arc<dyn ProfileStore>,
        llm: Arc<dyn LlmCollaborator>,
    ) -> Self {
        Self { classifier, search, profiles, llm }
    }

    pub async fn dispatch(&self, request: DispatchRequest, viewed_ids: &[i64]) -> Result<DispatchResult> {
        let has_referenced_user = !request.referenced_user_ids.is_empty();
        let classification = self.classifier.classify(&request.utterance, has_referenced_user).await;

        if classification.confidence < CONFIDENCE_CLARIFICATION_THRESHOLD {
            return Ok(DispatchResult::Clarification {
                message: "Could you say a bit more about what you're looking for?".to_string(),
            });
        }

        match classification.intent.as_str() {
            "search" => {
                let hits = retry_once(|| self.search.search(&request.utterance, viewed_ids, 20))
                    .await
                    .map_err(Error::UpstreamTimeout)?;
                Ok(DispatchResult::Search {
                    hits,
                    rationale: classification.reasoning,
                })
            }
            "inquiry" => {
                let Some(&referenced_id) = request.referenced_user_ids.first() else {
                    return Ok(DispatchResult::Clarification {
                        message: "Who would you like to know more about?".to_string(),
                    });
                };

                let profile = retry_once(|| self.profiles.get_profile(referenced_id))
                    .await
                    .map_err(Error::UpstreamTimeout)?;

                let Some(profile) = profile else {
                    return Err(Error::NotFound("no such profile".to_string()));
                };

                let grounding = vec![profile.to_string()];
                let answer = retry_once(|| self.llm.answer(&request.utterance, &grounding))
                    .await
                    .map_err(Error::UpstreamTimeout)?;

                Ok(DispatchResult::Inquiry { answer })
            }
            _ => Ok(DispatchResult::Casual {
                reply: "Tell me what you're looking for and I can help you find it.".to_string(),
                suggestions: vec![
                    "Search for people nearby".to_string(),
                    "Ask about someone you matched with".to_string(),
                ],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::classifier::RuleBasedClassifier;
    use crate::collaborators::llm::fakes::FixedLlm;
    use crate::collaborators::llm::ClassifyResult;
    use crate::collaborators::profile::fakes::InMemoryProfileStore;
    use crate::collaborators::search::fakes::FixedSearch;
    use crate::collaborators::search::SearchHit;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            Arc::new(RuleBasedClassifier),
            Arc::new(FixedSearch(vec![SearchHit { user_id: 9, score: 0.9 }])),
            Arc::new(InMemoryProfileStore::default()),
            Arc::new(FixedLlm {
                classify_result: ClassifyResult { intent: "casual".to_string(), confidence: 0.5, reasoning: String::new() },
                answer_text: "they build mobile apps".to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn search_utterance_routes_to_search() {
        let result = dispatcher()
            .dispatch(
                DispatchRequest {
                    utterance: "find a student in shenzhen who wants to build mobile apps".to_string(),
                    referenced_user_ids: vec![],
                    caller_id: 1,
                },
                &[],
            )
            .await
            .unwrap();
        assert!(matches!(result, DispatchResult::Search { .. }));
    }

    #[tokio::test]
    async fn inquiry_without_referenced_user_asks_for_clarification() {
        let result = dispatcher()
            .dispatch(
                DispatchRequest {
                    utterance: "tell me about this person".to_string(),
                    referenced_user_ids: vec![],
                    caller_id: 1,
                },
                &[],
            )
            .await
            .unwrap();
        assert!(matches!(result, DispatchResult::Clarification { .. }));
    }
}
