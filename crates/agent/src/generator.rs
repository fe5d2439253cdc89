use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use saiborg_core::domain::crm::CrmItem;
use saiborg_core::domain::turn::Intent;
use saiborg_index::retriever::RetrievedContext;

use crate::llm::{complete_with_retry, LlmClient, LlmError};
use crate::prompts::{PromptError, PromptLibrary};

/// Slack rejects very long messages; stay comfortably under the limit and
/// mark truncation visibly.
const MAX_REPLY_CHARS: usize = 3900;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Builds the per-intent prompt, calls the model, and shapes the output for
/// the target channel. No side effects beyond the outbound model call.
pub struct ResponseGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLibrary,
    max_retries: u32,
    max_reply_chars: usize,
}

impl ResponseGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, max_retries: u32) -> Result<Self, PromptError> {
        Ok(Self {
            llm,
            prompts: PromptLibrary::new()?,
            max_retries,
            max_reply_chars: MAX_REPLY_CHARS,
        })
    }

    #[doc(hidden)]
    pub fn with_max_reply_chars(mut self, max_reply_chars: usize) -> Self {
        self.max_reply_chars = max_reply_chars.max(1);
        self
    }

    pub async fn document_answer(
        &self,
        user_text: &str,
        retrieved: &RetrievedContext,
    ) -> Result<String, GenerateError> {
        let prompt = self.prompts.doc_qa(user_text, &retrieved.context)?;
        let reply = self.complete(&prompt).await?;
        info!(intent = Intent::DocQa.label(), citations = retrieved.citations.len(), "reply generated");
        Ok(reply)
    }

    pub async fn crm_answer(
        &self,
        intent: Intent,
        user_text: &str,
        items: &[CrmItem],
    ) -> Result<String, GenerateError> {
        let prompt = self.prompts.crm(intent, user_text, items)?;
        let reply = self.complete(&prompt).await?;
        info!(intent = intent.label(), items = items.len(), "reply generated");
        Ok(reply)
    }

    async fn complete(&self, prompt: &str) -> Result<String, GenerateError> {
        let raw = complete_with_retry(self.llm.as_ref(), prompt, self.max_retries).await?;
        Ok(sanitize_reply(&raw, self.max_reply_chars))
    }
}

/// Strip control characters the chat platform renders badly and cap the
/// length on a char boundary, marking the cut with an ellipsis.
fn sanitize_reply(raw: &str, max_chars: usize) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| !ch.is_control() || *ch == '\n' || *ch == '\t')
        .collect();

    if cleaned.chars().count() <= max_chars {
        return cleaned;
    }

    let mut truncated: String = cleaned.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use saiborg_core::domain::crm::{ColumnValue, CrmItem, ItemId};
    use saiborg_core::domain::turn::Intent;
    use saiborg_index::retriever::RetrievedContext;

    use crate::llm::{LlmClient, LlmError};

    use super::{sanitize_reply, GenerateError, ResponseGenerator};

    struct ScriptedLlm {
        reply: Result<String, LlmError>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn replying(reply: &str) -> Self {
            Self { reply: Ok(reply.to_string()), prompts: Mutex::new(Vec::new()) }
        }

        fn failing(error: LlmError) -> Self {
            Self { reply: Err(error), prompts: Mutex::new(Vec::new()) }
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().expect("lock").last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().expect("lock").push(prompt.to_string());
            self.reply.clone()
        }
    }

    #[tokio::test]
    async fn document_answer_feeds_context_into_the_prompt() {
        let llm = Arc::new(ScriptedLlm::replying("Returperioden er 30 dage."));
        let generator = ResponseGenerator::new(llm.clone(), 0).expect("generator");

        let retrieved = RetrievedContext {
            context: "[returpolitik.pdf s.1]\nReturperioden er 30 dage.".to_string(),
            citations: Vec::new(),
        };
        let reply = generator
            .document_answer("Hvad er vores returpolitik?", &retrieved)
            .await
            .expect("reply");

        assert_eq!(reply, "Returperioden er 30 dage.");
        assert!(llm.last_prompt().contains("[returpolitik.pdf s.1]"));
        assert!(llm.last_prompt().contains("Hvad er vores returpolitik?"));
    }

    #[tokio::test]
    async fn crm_answer_serializes_items_into_the_prompt() {
        let llm = Arc::new(ScriptedLlm::replying("**Vocast – Kontakt: Sanne**"));
        let generator = ResponseGenerator::new(llm.clone(), 0).expect("generator");

        let items = [CrmItem {
            id: ItemId("901".to_string()),
            name: "Vocast".to_string(),
            column_values: vec![ColumnValue {
                id: "status".to_string(),
                text: Some("Varmt lead".to_string()),
            }],
        }];
        let reply = generator
            .crm_answer(Intent::CrmSearch, "Find kunden Vocast i Monday", &items)
            .await
            .expect("reply");

        assert!(reply.contains("Vocast"));
        assert!(llm.last_prompt().contains("Varmt lead"));
    }

    #[tokio::test]
    async fn llm_failure_propagates_to_the_caller() {
        let llm = Arc::new(ScriptedLlm::failing(LlmError::Provider {
            status: 400,
            message: "bad request".to_string(),
        }));
        let generator = ResponseGenerator::new(llm, 0).expect("generator");

        let retrieved = RetrievedContext { context: String::new(), citations: Vec::new() };
        let error = generator
            .document_answer("spørgsmål", &retrieved)
            .await
            .expect_err("llm failure should propagate");
        assert!(matches!(error, GenerateError::Llm(_)));
    }

    #[tokio::test]
    async fn long_replies_are_truncated_for_the_channel() {
        let llm = Arc::new(ScriptedLlm::replying(&"a".repeat(500)));
        let generator = ResponseGenerator::new(llm, 0)
            .expect("generator")
            .with_max_reply_chars(100);

        let retrieved = RetrievedContext { context: String::new(), citations: Vec::new() };
        let reply = generator.document_answer("spørgsmål", &retrieved).await.expect("reply");

        assert_eq!(reply.chars().count(), 100);
        assert!(reply.ends_with('…'));
    }

    #[test]
    fn sanitize_strips_control_characters_but_keeps_newlines() {
        let cleaned = sanitize_reply("linje et\n\u{7}linje to\tslut", 100);
        assert_eq!(cleaned, "linje et\nlinje to\tslut");
    }
}
