use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use saiborg_agent::GeminiClient;
use saiborg_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use saiborg_index::{Chunker, IndexError, IndexReport, Indexer, VectorStore};

use super::{block_on, serialize_payload, CommandResult};

#[derive(Debug, Serialize)]
struct IndexOutcome {
    command: &'static str,
    status: &'static str,
    store_path: String,
    data_dir: String,
    files_indexed: usize,
    files_skipped: usize,
    pages: usize,
    chunks_written: usize,
    chunks_skipped: usize,
}

/// Offline indexing entry point: rebuild the vector store from the source
/// document directory.
pub fn run(data_dir: Option<String>) -> CommandResult {
    let options = LoadOptions {
        overrides: ConfigOverrides { data_dir, ..ConfigOverrides::default() },
        ..LoadOptions::default()
    };

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("index", "config", error.to_string(), 2),
    };

    let embedder = match GeminiClient::from_config(&config.llm) {
        Ok(client) => Arc::new(client),
        Err(error) => return CommandResult::failure("index", "llm", error.to_string(), 6),
    };

    match block_on(rebuild(&config, embedder)) {
        Ok(Ok(report)) => {
            let payload = IndexOutcome {
                command: "index",
                status: "ok",
                store_path: config.index.store_path.clone(),
                data_dir: config.index.data_dir.clone(),
                files_indexed: report.files_indexed,
                files_skipped: report.files_skipped,
                pages: report.pages,
                chunks_written: report.chunks_written,
                chunks_skipped: report.chunks_skipped,
            };
            CommandResult { exit_code: 0, output: serialize_payload(payload) }
        }
        Ok(Err(error)) => {
            let (class, exit_code) = classify(&error);
            CommandResult::failure("index", class, error.to_string(), exit_code)
        }
        Err(error) => CommandResult::failure("index", "runtime", error, 1),
    }
}

async fn rebuild(
    config: &AppConfig,
    embedder: Arc<GeminiClient>,
) -> Result<IndexReport, IndexError> {
    let store = VectorStore::open(&config.index.store_path).await?;
    let indexer = Indexer::new(
        store,
        embedder,
        Chunker::new(config.index.chunk_size, config.index.chunk_overlap),
    );
    indexer.run(Path::new(&config.index.data_dir)).await
}

fn classify(error: &IndexError) -> (&'static str, u8) {
    match error {
        IndexError::Io { .. } => ("io", 3),
        IndexError::NoDocuments(_) => ("no_documents", 4),
        IndexError::Store(_) => ("store", 5),
    }
}
