use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EmbedError {
    #[error("embedding transport failed: {0}")]
    Transport(String),
    #[error("embedding provider rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },
    #[error("embedding provider returned an empty vector")]
    Empty,
}

impl EmbedError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Provider { status, .. } => *status == 429 || *status >= 500,
            Self::Empty => false,
        }
    }
}

/// Text-to-vector seam. The indexer and the retriever must share one
/// implementation so the stored dimensionality matches the query side.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Provider model identifier, recorded in the store metadata.
    fn model(&self) -> &str;
    /// Fixed output dimensionality for `model`.
    fn dimension(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Retry wrapper for embedding calls: transient failures get `max_retries`
/// additional attempts with a short doubling delay, everything else fails
/// immediately.
pub async fn embed_with_retry(
    embedder: &dyn Embedder,
    text: &str,
    max_retries: u32,
) -> Result<Vec<f32>, EmbedError> {
    let mut attempt = 0;
    loop {
        match embedder.embed(text).await {
            Ok(vector) => return Ok(vector),
            Err(error) if error.is_transient() && attempt < max_retries => {
                attempt += 1;
                warn!(
                    attempt,
                    max_retries,
                    error = %error,
                    "transient embedding failure; retrying"
                );
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            }
            Err(error) => return Err(error),
        }
    }
}
