//! Intent classifier (component K, spec §4.6). The core does not constrain
//! how the label is produced (spec §9 Open Questions: "a rules engine or a
//! different model") — only the contract: deterministic given the same
//! input, and it must complete within the router's deadline.

use async_trait::async_trait;
use std::time::Duration;

use crate::collaborators::llm::{ClassifyResult, LlmCollaborator};

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, utterance: &str, has_referenced_user: bool) -> ClassifyResult;
}

/// Routes through the LLM-like collaborator; on timeout or failure, falls
/// back to `casual` per spec §4.6 failure semantics, not propagated as an
/// error.
pub struct LlmIntentClassifier {
    llm: std::sync::Arc<dyn LlmCollaborator>,
    deadline: Duration,
}

impl LlmIntentClassifier {
    pub fn new(llm: std::sync::Arc<dyn LlmCollaborator>, deadline: Duration) -> Self {
        Self { llm, deadline }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, utterance: &str, has_referenced_user: bool) -> ClassifyResult {
        let context = if has_referenced_user { "has_referenced_user" } else { "no_referenced_user" };
        match tokio::time::timeout(self.deadline, self.llm.classify(utterance, context)).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) | Err(_) => ClassifyResult {
                intent: "casual".to_string(),
                confidence: 0.0,
                reasoning: "classifier unavailable, defaulted to casual".to_string(),
            },
        }
    }
}

/// Deterministic keyword-based classifier. Used as the default when no LLM
/// collaborator is configured, and directly in tests.
pub struct RuleBasedClassifier;

const SEARCH_KEYWORDS: &[&str] = &["find", "looking for", "search", "who wants to", "anyone in"];
const INQUIRY_KEYWORDS: &[&str] = &["tell me about", "who is", "what does", "this person"];

#[async_trait]
impl IntentClassifier for RuleBasedClassifier {
    async fn classify(&self, utterance: &str, has_referenced_user: bool) -> ClassifyResult {
        let lower = utterance.to_lowercase();

        if INQUIRY_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return ClassifyResult {
                intent: "inquiry".to_string(),
                confidence: if has_referenced_user { 0.8 } else { 0.5 },
                reasoning: "matched an inquiry keyword".to_string(),
            };
        }

        if SEARCH_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return ClassifyResult {
                intent: "search".to_string(),
                confidence: 0.75,
                reasoning: "matched a search keyword".to_string(),
            };
        }

        ClassifyResult {
            intent: "casual".to_string(),
            confidence: 0.6,
            reasoning: "no search or inquiry keyword matched".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_keywords_route_to_search() {
        let result = RuleBasedClassifier.classify("find a student in shenzhen who wants to build mobile apps", false).await;
        assert_eq!(result.intent, "search");
    }

    #[tokio::test]
    async fn inquiry_keyword_with_reference_is_confident() {
        let result = RuleBasedClassifier.classify("tell me about this person", true).await;
        assert_eq!(result.intent, "inquiry");
        assert!(result.confidence >= 0.4);
    }

    #[tokio::test]
    async fn unmatched_utterance_is_casual() {
        let result = RuleBasedClassifier.classify("haha nice", false).await;
        assert_eq!(result.intent, "casual");
    }
}
