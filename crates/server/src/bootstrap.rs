use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use saiborg_agent::{AssistantRuntime, GeminiClient, ResponseGenerator};
use saiborg_core::config::{AppConfig, ConfigError, LoadOptions};
use saiborg_core::domain::turn::TurnOutcome;
use saiborg_core::errors::TurnError;
use saiborg_crm::client::{CrmService, MondayClient};
use saiborg_index::embedder::Embedder;
use saiborg_index::retriever::Retriever;
use saiborg_index::store::{StoreError, VectorStore};
use saiborg_slack::api::SlackApiClient;
use saiborg_slack::events::{EventDispatcher, MentionHandler, ReplySink};

use saiborg_agent::llm::LlmClient;

/// Process-wide state built once at startup and handed to each component
/// explicitly; nothing here is ambient.
pub struct Application {
    pub config: AppConfig,
    pub store: VectorStore,
    pub runtime: Arc<AssistantRuntime>,
    pub slack_api: SlackApiClient,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("vector store open failed: {0}")]
    Store(#[from] StoreError),
    #[error("llm client init failed: {0}")]
    Llm(String),
    #[error("crm client init failed: {0}")]
    Crm(String),
    #[error("slack api client init failed: {0}")]
    Slack(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let store = VectorStore::open(&config.index.store_path).await?;
    let chunk_count = store.count().await?;
    if chunk_count == 0 {
        warn!(
            store_path = %config.index.store_path,
            "vector store holds no chunks; document questions will get the no-knowledge-base reply until `saiborg index` has run"
        );
    } else {
        info!(
            event_name = "system.bootstrap.store_opened",
            correlation_id = "bootstrap",
            store_path = %config.index.store_path,
            chunk_count,
            "vector store opened"
        );
    }

    let gemini = Arc::new(
        GeminiClient::from_config(&config.llm)
            .map_err(|error| BootstrapError::Llm(error.to_string()))?,
    );

    let retriever = Retriever::new(
        store.clone(),
        gemini.clone() as Arc<dyn Embedder>,
        config.index.top_k,
        config.index.max_context_chars,
    );
    let generator =
        ResponseGenerator::new(gemini as Arc<dyn LlmClient>, config.llm.max_retries)
            .map_err(|error| BootstrapError::Llm(error.to_string()))?;

    let crm = MondayClient::from_config(&config.crm)
        .map_err(|error| BootstrapError::Crm(error.to_string()))?
        .map(|client| Arc::new(client) as Arc<dyn CrmService>);
    if crm.is_none() {
        warn!("no crm api key configured; crm features are disabled");
    }

    let runtime = Arc::new(AssistantRuntime::new(retriever, generator, crm));
    let slack_api = SlackApiClient::from_config(&config.slack)
        .map_err(|error| BootstrapError::Slack(error.to_string()))?;

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        crm_enabled = config.crm.enabled(),
        "application bootstrap finished"
    );

    Ok(Application { config, store, runtime, slack_api })
}

/// Adapter between the slack gateway seam and the agent runtime.
pub struct RuntimeMentionService(pub Arc<AssistantRuntime>);

#[async_trait]
impl saiborg_slack::events::MentionService for RuntimeMentionService {
    async fn handle_message(&self, text: &str) -> Result<TurnOutcome, TurnError> {
        self.0.handle(text).await
    }
}

/// Wire the gateway handlers once the bot user id is known.
pub fn build_dispatcher(app: &Application, bot_user_id: &str) -> EventDispatcher {
    let sink: Arc<dyn ReplySink> = Arc::new(app.slack_api.clone());
    let turn_timeout = Duration::from_secs(app.config.server.turn_timeout_secs);

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MentionHandler::for_mentions(
        RuntimeMentionService(app.runtime.clone()),
        sink.clone(),
        bot_user_id,
        turn_timeout,
    ));
    dispatcher.register(MentionHandler::for_direct_messages(
        RuntimeMentionService(app.runtime.clone()),
        sink,
        bot_user_id,
        turn_timeout,
    ));
    dispatcher
}
