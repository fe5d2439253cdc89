use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use saiborg_core::domain::chunk::Citation;

use crate::embedder::{embed_with_retry, EmbedError, Embedder};
use crate::store::{ScoredChunk, StoreError, VectorStore};

const SNIPPET_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("vector store holds no chunks")]
    EmptyIndex,
    #[error(
        "store was built with `{store_model}` ({store_dimension} dims) but the embedder provides `{embedder_model}` ({embedder_dimension} dims)"
    )]
    IncompatibleStore {
        store_model: String,
        store_dimension: usize,
        embedder_model: String,
        embedder_dimension: usize,
    },
    #[error(transparent)]
    Embed(#[from] EmbedError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Source-tagged context assembled for one question, plus the citation
/// metadata of every chunk that made it into the budget.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievedContext {
    pub context: String,
    pub citations: Vec<Citation>,
}

/// Read-only retrieval pipeline over the vector store. Never mutates the
/// store.
pub struct Retriever {
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    max_context_chars: usize,
    max_embed_retries: u32,
}

impl Retriever {
    pub fn new(
        store: VectorStore,
        embedder: Arc<dyn Embedder>,
        top_k: usize,
        max_context_chars: usize,
    ) -> Self {
        Self { store, embedder, top_k, max_context_chars, max_embed_retries: 1 }
    }

    pub async fn retrieve(&self, question: &str) -> Result<RetrievedContext, RetrieveError> {
        let Some(metadata) = self.store.metadata().await? else {
            return Err(RetrieveError::EmptyIndex);
        };
        if self.store.count().await? == 0 {
            return Err(RetrieveError::EmptyIndex);
        }

        if metadata.embedding_model != self.embedder.model()
            || metadata.dimension != self.embedder.dimension()
        {
            return Err(RetrieveError::IncompatibleStore {
                store_model: metadata.embedding_model,
                store_dimension: metadata.dimension,
                embedder_model: self.embedder.model().to_string(),
                embedder_dimension: self.embedder.dimension(),
            });
        }

        let query = embed_with_retry(self.embedder.as_ref(), question, self.max_embed_retries)
            .await?;
        let hits = self.store.search(&query, self.top_k).await?;
        info!(hits = hits.len(), "retrieved document snippets");

        Ok(self.assemble(&hits))
    }

    fn assemble(&self, hits: &[ScoredChunk]) -> RetrievedContext {
        let mut context = String::new();
        let mut citations = Vec::new();

        for hit in hits {
            let snippet =
                format!("[{} s.{}]\n{}", hit.chunk.source, hit.chunk.page, hit.chunk.text);
            let addition =
                if context.is_empty() { snippet.len() } else { SNIPPET_SEPARATOR.len() + snippet.len() };

            if context.len() + addition > self.max_context_chars {
                if context.is_empty() {
                    // The very first snippet alone blows the budget; keep a
                    // truncated prefix instead of returning nothing.
                    context = truncate_on_char_boundary(&snippet, self.max_context_chars);
                    citations.push(citation_of(hit));
                }
                debug!(chunk_id = %hit.chunk.id.0, "context budget reached");
                break;
            }

            if !context.is_empty() {
                context.push_str(SNIPPET_SEPARATOR);
            }
            context.push_str(&snippet);
            citations.push(citation_of(hit));
        }

        RetrievedContext { context, citations }
    }
}

fn citation_of(hit: &ScoredChunk) -> Citation {
    Citation { source: hit.chunk.source.clone(), page: hit.chunk.page, score: hit.score }
}

fn truncate_on_char_boundary(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text[..cut].to_string()
}
