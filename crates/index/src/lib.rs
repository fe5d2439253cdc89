//! Document indexing and retrieval for saiborg.
//!
//! The write side (`indexer`) runs offline: it scans a directory of PDFs,
//! extracts page text, splits it into overlapping chunks, embeds each chunk
//! and rebuilds the SQLite-backed vector store. The read side (`retriever`)
//! serves questions against that store without ever mutating it. Both sides
//! share the [`Embedder`] seam so the stored dimensionality always matches
//! the query side.

pub mod chunker;
pub mod embedder;
pub mod indexer;
pub mod pdf;
pub mod retriever;
pub mod store;

pub use chunker::Chunker;
pub use embedder::{embed_with_retry, EmbedError, Embedder};
pub use indexer::{IndexError, IndexReport, Indexer, PageExtractor};
pub use pdf::PdfError;
pub use retriever::{RetrieveError, RetrievedContext, Retriever};
pub use store::{ScoredChunk, StoreError, StoreMetadata, VectorStore};
