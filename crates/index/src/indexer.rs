use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use saiborg_core::domain::chunk::{ChunkId, DocumentChunk};

use crate::chunker::Chunker;
use crate::embedder::{embed_with_retry, Embedder};
use crate::pdf::{self, PdfError};
use crate::store::{StoreError, VectorStore};

/// Seam for page extraction so the pipeline is testable without real PDF
/// fixtures. Production uses [`pdf::extract_pages`].
pub type PageExtractor = fn(&Path) -> Result<Vec<String>, PdfError>;

/// Embedding calls get one retry on transient failure, then the chunk is
/// skipped and logged.
const MAX_EMBED_RETRIES: u32 = 1;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub pages: usize,
    pub chunks_written: usize,
    pub chunks_skipped: usize,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("could not read document directory `{path}`: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("no readable pdf documents found in `{0}`")]
    NoDocuments(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Offline indexing pipeline: scan a directory for PDFs, extract page text,
/// chunk, embed, and rebuild the vector store. Runs out-of-band from the
/// serving process.
pub struct Indexer {
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    extract_pages: PageExtractor,
}

impl Indexer {
    pub fn new(store: VectorStore, embedder: Arc<dyn Embedder>, chunker: Chunker) -> Self {
        Self { store, embedder, chunker, extract_pages: pdf::extract_pages }
    }

    pub fn with_page_extractor(mut self, extract_pages: PageExtractor) -> Self {
        self.extract_pages = extract_pages;
        self
    }

    pub async fn run(&self, data_dir: &Path) -> Result<IndexReport, IndexError> {
        let mut report = IndexReport::default();
        let documents = self.load_documents(data_dir, &mut report).await?;

        if documents.is_empty() {
            return Err(IndexError::NoDocuments(data_dir.display().to_string()));
        }

        self.store
            .begin_rebuild(self.embedder.model(), self.embedder.dimension())
            .await?;

        for (source, pages) in documents {
            report.files_indexed += 1;
            for (page_idx, page_text) in pages.iter().enumerate() {
                let page_text = page_text.trim();
                if page_text.is_empty() {
                    continue;
                }
                report.pages += 1;
                let page = page_idx as u32 + 1;

                for (seq, text) in self.chunker.split(page_text).into_iter().enumerate() {
                    let chunk = DocumentChunk {
                        id: ChunkId(format!("{source}:{page}:{seq}")),
                        source: source.clone(),
                        page,
                        seq: seq as u32,
                        text,
                    };

                    match embed_with_retry(self.embedder.as_ref(), &chunk.text, MAX_EMBED_RETRIES)
                        .await
                    {
                        Ok(embedding) => {
                            self.store.upsert_chunk(&chunk, &embedding).await?;
                            report.chunks_written += 1;
                        }
                        Err(error) => {
                            warn!(
                                chunk_id = %chunk.id.0,
                                error = %error,
                                "embedding failed; chunk skipped"
                            );
                            report.chunks_skipped += 1;
                        }
                    }
                }
            }
        }

        info!(
            event_name = "index.rebuild.finished",
            files_indexed = report.files_indexed,
            files_skipped = report.files_skipped,
            pages = report.pages,
            chunks_written = report.chunks_written,
            chunks_skipped = report.chunks_skipped,
            "vector store rebuilt"
        );

        Ok(report)
    }

    async fn load_documents(
        &self,
        data_dir: &Path,
        report: &mut IndexReport,
    ) -> Result<Vec<(String, Vec<String>)>, IndexError> {
        let entries = std::fs::read_dir(data_dir).map_err(|source| IndexError::Io {
            path: data_dir.display().to_string(),
            source,
        })?;

        let mut pdf_paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && pdf::is_pdf_file(path))
            .collect();
        pdf_paths.sort();

        let mut documents = Vec::with_capacity(pdf_paths.len());
        for path in pdf_paths {
            let source = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let extract = self.extract_pages;
            let extraction = {
                let path = path.clone();
                tokio::task::spawn_blocking(move || extract(&path)).await
            };

            match extraction {
                Ok(Ok(pages)) => {
                    info!(source = %source, pages = pages.len(), "extracted document");
                    documents.push((source, pages));
                }
                Ok(Err(error)) => {
                    warn!(source = %source, error = %error, "unreadable pdf skipped");
                    report.files_skipped += 1;
                }
                Err(join_error) => {
                    warn!(source = %source, error = %join_error, "pdf extraction task failed");
                    report.files_skipped += 1;
                }
            }
        }

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::chunker::Chunker;
    use crate::embedder::{EmbedError, Embedder};
    use crate::pdf::PdfError;
    use crate::store::VectorStore;

    use super::{IndexError, Indexer};

    /// Reads fake "PDFs" as UTF-8, pages separated by form feeds. A file
    /// containing exactly `BROKEN` simulates an unreadable document.
    fn fake_extractor(path: &Path) -> Result<Vec<String>, PdfError> {
        let raw = fs::read_to_string(path).map_err(|error| PdfError::Extract {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
        if raw.trim() == "BROKEN" {
            return Err(PdfError::Extract {
                path: path.display().to_string(),
                message: "damaged xref table".to_string(),
            });
        }
        Ok(raw.split('\u{c}').map(str::to_string).collect())
    }

    struct HashEmbedder;

    #[async_trait]
    impl Embedder for HashEmbedder {
        fn model(&self) -> &str {
            "test-embedding"
        }

        fn dimension(&self) -> usize {
            4
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            if text.contains("GIFT") {
                return Err(EmbedError::Provider {
                    status: 400,
                    message: "content rejected".to_string(),
                });
            }
            let mut vector = [0.0f32; 4];
            for (idx, byte) in text.bytes().enumerate() {
                vector[idx % 4] += f32::from(byte) / 255.0;
            }
            Ok(vector.to_vec())
        }
    }

    async fn indexer_for(dir: &TempDir) -> (Indexer, VectorStore) {
        let store = VectorStore::open(dir.path().join("store.db")).await.expect("store");
        let indexer = Indexer::new(store.clone(), Arc::new(HashEmbedder), Chunker::new(40, 10))
            .with_page_extractor(fake_extractor);
        (indexer, store)
    }

    #[tokio::test]
    async fn indexes_every_document_with_at_least_one_chunk() {
        let dir = TempDir::new().expect("tempdir");
        let data = TempDir::new().expect("data dir");
        fs::write(data.path().join("a.pdf"), "Returperioden er 30 dage for alle varer.")
            .expect("write");
        fs::write(
            data.path().join("b.pdf"),
            "Side et om priser.\u{c}Side to om levering og fragt.",
        )
        .expect("write");

        let (indexer, store) = indexer_for(&dir).await;
        let report = indexer.run(data.path()).await.expect("index run");

        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.files_skipped, 0);
        assert_eq!(report.pages, 3);
        assert!(report.chunks_written >= 2, "at least one chunk per document");
        assert_eq!(store.count().await.expect("count"), report.chunks_written as u64);

        let metadata = store.metadata().await.expect("metadata").expect("present");
        assert_eq!(metadata.embedding_model, "test-embedding");
        assert_eq!(metadata.dimension, 4);
    }

    #[tokio::test]
    async fn reindexing_unchanged_input_is_idempotent() {
        let dir = TempDir::new().expect("tempdir");
        let data = TempDir::new().expect("data dir");
        fs::write(data.path().join("a.pdf"), "Vilkår og betingelser for abonnementet.")
            .expect("write");

        let (indexer, store) = indexer_for(&dir).await;
        let first = indexer.run(data.path()).await.expect("first run");
        let count_after_first = store.count().await.expect("count");

        let second = indexer.run(data.path()).await.expect("second run");
        assert_eq!(first, second);
        assert_eq!(store.count().await.expect("count"), count_after_first);
    }

    #[tokio::test]
    async fn missing_directory_is_an_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let (indexer, _store) = indexer_for(&dir).await;

        let error = indexer
            .run(Path::new("/nonexistent/saiborg-data"))
            .await
            .expect_err("missing dir should fail");
        assert!(matches!(error, IndexError::Io { .. }));
    }

    #[tokio::test]
    async fn directory_without_pdfs_reports_no_documents() {
        let dir = TempDir::new().expect("tempdir");
        let data = TempDir::new().expect("data dir");
        fs::write(data.path().join("notes.txt"), "ikke en pdf").expect("write");

        let (indexer, _store) = indexer_for(&dir).await;
        let error = indexer.run(data.path()).await.expect_err("no pdfs should fail");
        assert!(matches!(error, IndexError::NoDocuments(_)));
    }

    #[tokio::test]
    async fn unreadable_pdf_is_skipped_not_fatal() {
        let dir = TempDir::new().expect("tempdir");
        let data = TempDir::new().expect("data dir");
        fs::write(data.path().join("ok.pdf"), "Almindelig salgsbetingelse.").expect("write");
        fs::write(data.path().join("broken.pdf"), "BROKEN").expect("write");

        let (indexer, store) = indexer_for(&dir).await;
        let report = indexer.run(data.path()).await.expect("run should continue");

        assert_eq!(report.files_indexed, 1);
        assert_eq!(report.files_skipped, 1);
        assert!(store.count().await.expect("count") > 0);
    }

    #[tokio::test]
    async fn chunk_with_failing_embedding_is_skipped_and_counted() {
        let dir = TempDir::new().expect("tempdir");
        let data = TempDir::new().expect("data dir");
        fs::write(data.path().join("a.pdf"), "GIFT").expect("write");
        fs::write(data.path().join("b.pdf"), "Helt almindelig tekst.").expect("write");

        let (indexer, store) = indexer_for(&dir).await;
        let report = indexer.run(data.path()).await.expect("run should continue");

        assert_eq!(report.chunks_skipped, 1);
        assert!(report.chunks_written >= 1);
        assert_eq!(store.count().await.expect("count"), report.chunks_written as u64);
    }
}
