use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("llm transport failed: {0}")]
    Transport(String),
    #[error("llm provider rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },
    #[error("llm returned an empty completion")]
    Empty,
}

impl LlmError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Provider { status, .. } => *status == 429 || *status >= 500,
            Self::Empty => false,
        }
    }
}

/// Completion seam. The model is strictly a text-in/text-out formatter here:
/// routing and data lookup decisions are made deterministically before any
/// prompt is built.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// One-retry policy for model calls: a transient failure gets up to
/// `max_retries` extra attempts, anything else fails the turn.
pub async fn complete_with_retry(
    client: &dyn LlmClient,
    prompt: &str,
    max_retries: u32,
) -> Result<String, LlmError> {
    let mut attempt = 0;
    loop {
        match client.complete(prompt).await {
            Ok(text) => return Ok(text),
            Err(error) if error.is_transient() && attempt < max_retries => {
                attempt += 1;
                warn!(attempt, max_retries, error = %error, "transient llm failure; retrying");
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            }
            Err(error) => return Err(error),
        }
    }
}
