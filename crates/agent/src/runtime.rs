use std::sync::Arc;

use tracing::{info, warn};

use saiborg_core::domain::turn::{Intent, TurnOutcome};
use saiborg_core::errors::TurnError;
use saiborg_core::router::{IntentRouter, RoutedIntent};
use saiborg_crm::client::{CrmError, CrmService};
use saiborg_index::retriever::{RetrieveError, Retriever};

use crate::generator::{GenerateError, ResponseGenerator};

/// Reply when a CRM lookup matched nothing. A miss is a successful turn,
/// not an error.
const NO_MATCH_REPLY: &str =
    "Jeg kunne ikke finde nogen kunder/leads i Monday, der matcher din forespørgsel.";

const NO_CRM_KEY_REPLY: &str = "Jeg har ikke nogen Monday API-nøgle konfigureret.";

/// Per-turn pipeline: route the message, enrich it with retrieval or CRM
/// data, and generate the reply. Each call is independent; no state is
/// shared between turns beyond the read-only store and the remote CRM.
pub struct AssistantRuntime {
    router: IntentRouter,
    retriever: Retriever,
    generator: ResponseGenerator,
    crm: Option<Arc<dyn CrmService>>,
}

impl AssistantRuntime {
    pub fn new(
        retriever: Retriever,
        generator: ResponseGenerator,
        crm: Option<Arc<dyn CrmService>>,
    ) -> Self {
        Self { router: IntentRouter::new(), retriever, generator, crm }
    }

    pub async fn handle(&self, text: &str) -> Result<TurnOutcome, TurnError> {
        let text = text.trim();
        let lower = text.to_lowercase();

        // Health-check phrase is looked at before routing, like any other
        // operator shortcut.
        if lower.contains("monday test") {
            return Ok(self.connection_test_outcome().await);
        }

        let routed = self.router.route(text);
        info!(
            intent = routed.intent.label(),
            entity = routed.entity.as_deref().unwrap_or(""),
            board_wide = routed.board_wide,
            "message routed"
        );

        if routed.intent.needs_crm() {
            self.handle_crm_turn(text, &routed).await
        } else {
            self.handle_doc_qa_turn(text).await
        }
    }

    async fn connection_test_outcome(&self) -> TurnOutcome {
        let reply = match &self.crm {
            None => NO_CRM_KEY_REPLY.to_string(),
            Some(crm) => match crm.connection_test().await {
                Ok(account) => format!(
                    "✅ Monday-forbindelse virker! Du er logget ind som: {} ({})",
                    account.name,
                    account.email.as_deref().unwrap_or("ukendt email")
                ),
                Err(error) => {
                    warn!(error = %error, "crm connection test failed");
                    "❌ Jeg kunne ikke læse brugerinfo fra Monday – tjek API-nøglen.".to_string()
                }
            },
        };

        TurnOutcome { intent: Intent::CrmSearch, reply }
    }

    async fn handle_crm_turn(
        &self,
        text: &str,
        routed: &RoutedIntent,
    ) -> Result<TurnOutcome, TurnError> {
        let Some(crm) = &self.crm else {
            return Err(TurnError::CrmUnavailable("no crm api key configured".to_string()));
        };

        let items = if routed.board_wide {
            crm.list_all().await
        } else {
            crm.search(routed.entity.as_deref().unwrap_or_default()).await
        }
        .map_err(map_crm_error)?;

        if items.is_empty() {
            return Ok(TurnOutcome { intent: routed.intent, reply: NO_MATCH_REPLY.to_string() });
        }

        let reply = self
            .generator
            .crm_answer(routed.intent, text, &items)
            .await
            .map_err(map_generate_error)?;
        Ok(TurnOutcome { intent: routed.intent, reply })
    }

    async fn handle_doc_qa_turn(&self, text: &str) -> Result<TurnOutcome, TurnError> {
        let retrieved = self.retriever.retrieve(text).await.map_err(map_retrieve_error)?;
        let reply = self
            .generator
            .document_answer(text, &retrieved)
            .await
            .map_err(map_generate_error)?;
        Ok(TurnOutcome { intent: Intent::DocQa, reply })
    }
}

fn map_crm_error(error: CrmError) -> TurnError {
    match error {
        CrmError::Auth(message) => TurnError::CrmAuth(message),
        CrmError::Network(message) | CrmError::RateLimited(message) => {
            TurnError::Network(message)
        }
        CrmError::Api(message) | CrmError::Decode(message) => TurnError::Internal(message),
    }
}

fn map_generate_error(error: GenerateError) -> TurnError {
    match error {
        GenerateError::Prompt(error) => TurnError::Internal(error.to_string()),
        GenerateError::Llm(error) if error.is_transient() => {
            TurnError::Network(error.to_string())
        }
        GenerateError::Llm(error) => TurnError::Llm(error.to_string()),
    }
}

fn map_retrieve_error(error: RetrieveError) -> TurnError {
    match error {
        RetrieveError::EmptyIndex => TurnError::EmptyIndex,
        RetrieveError::Embed(error) if error.is_transient() => {
            TurnError::Network(error.to_string())
        }
        RetrieveError::Embed(error) => TurnError::Llm(error.to_string()),
        RetrieveError::IncompatibleStore { .. } | RetrieveError::Store(_) => {
            TurnError::Internal(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use saiborg_core::domain::crm::{ColumnValue, CrmAccount, CrmItem, ItemId};
    use saiborg_core::domain::turn::Intent;
    use saiborg_core::errors::TurnError;
    use saiborg_crm::client::{CrmError, CrmService};
    use saiborg_index::embedder::{EmbedError, Embedder};
    use saiborg_index::retriever::Retriever;
    use saiborg_index::store::VectorStore;

    use crate::generator::ResponseGenerator;
    use crate::llm::{LlmClient, LlmError};

    use super::AssistantRuntime;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model(&self) -> &str {
            "test-embedding"
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            if text.contains("retur") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        }
    }

    struct RecordingLlm {
        prompts: Mutex<Vec<String>>,
        reply: String,
    }

    impl RecordingLlm {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self { prompts: Mutex::new(Vec::new()), reply: reply.to_string() })
        }

        fn prompt_count(&self) -> usize {
            self.prompts.lock().expect("lock").len()
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().expect("lock").last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().expect("lock").push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct ScriptedCrm {
        items: Vec<CrmItem>,
        list_items: Vec<CrmItem>,
        search_terms: Mutex<Vec<String>>,
        error: Option<CrmError>,
    }

    impl ScriptedCrm {
        fn with_items(items: Vec<CrmItem>) -> Self {
            Self {
                items,
                list_items: Vec::new(),
                search_terms: Mutex::new(Vec::new()),
                error: None,
            }
        }

        fn failing(error: CrmError) -> Self {
            Self {
                items: Vec::new(),
                list_items: Vec::new(),
                search_terms: Mutex::new(Vec::new()),
                error: Some(error),
            }
        }
    }

    #[async_trait]
    impl CrmService for ScriptedCrm {
        async fn search(&self, term: &str) -> Result<Vec<CrmItem>, CrmError> {
            self.search_terms.lock().expect("lock").push(term.to_string());
            match &self.error {
                Some(error) => Err(error.clone()),
                None => Ok(self.items.clone()),
            }
        }

        async fn list_all(&self) -> Result<Vec<CrmItem>, CrmError> {
            match &self.error {
                Some(error) => Err(error.clone()),
                None => Ok(self.list_items.clone()),
            }
        }

        async fn connection_test(&self) -> Result<CrmAccount, CrmError> {
            match &self.error {
                Some(error) => Err(error.clone()),
                None => Ok(CrmAccount {
                    name: "Sanne Ib".to_string(),
                    email: Some("sanne@example.dk".to_string()),
                }),
            }
        }
    }

    fn vocast() -> CrmItem {
        CrmItem {
            id: ItemId("901".to_string()),
            name: "Vocast".to_string(),
            column_values: vec![ColumnValue {
                id: "status".to_string(),
                text: Some("Varmt lead".to_string()),
            }],
        }
    }

    async fn populated_retriever(dir: &TempDir) -> Retriever {
        let store = VectorStore::open(dir.path().join("store.db")).await.expect("store");
        store.begin_rebuild("test-embedding", 2).await.expect("rebuild");
        store
            .upsert_chunk(
                &saiborg_core::domain::chunk::DocumentChunk {
                    id: saiborg_core::domain::chunk::ChunkId("returpolitik.pdf:1:0".to_string()),
                    source: "returpolitik.pdf".to_string(),
                    page: 1,
                    seq: 0,
                    text: "Returperioden er 30 dage fra leveringsdato.".to_string(),
                },
                &[1.0, 0.0],
            )
            .await
            .expect("upsert");
        Retriever::new(store, Arc::new(FixedEmbedder), 4, 6000)
    }

    async fn empty_retriever(dir: &TempDir) -> Retriever {
        let store = VectorStore::open(dir.path().join("empty.db")).await.expect("store");
        Retriever::new(store, Arc::new(FixedEmbedder), 4, 6000)
    }

    fn runtime(
        retriever: Retriever,
        llm: Arc<RecordingLlm>,
        crm: Option<Arc<dyn CrmService>>,
    ) -> AssistantRuntime {
        let generator = ResponseGenerator::new(llm, 0).expect("generator");
        AssistantRuntime::new(retriever, generator, crm)
    }

    #[tokio::test]
    async fn crm_search_turn_embeds_item_data_in_the_reply() {
        let dir = TempDir::new().expect("tempdir");
        let llm = RecordingLlm::new("**Vocast** – status: Varmt lead. Bør følges op.");
        let crm = Arc::new(ScriptedCrm::with_items(vec![vocast()]));
        let runtime = runtime(
            populated_retriever(&dir).await,
            llm.clone(),
            Some(crm.clone() as Arc<dyn CrmService>),
        );

        let outcome = runtime
            .handle("Find kunden Vocast i Monday")
            .await
            .expect("turn should succeed");

        assert_eq!(outcome.intent, Intent::CrmSearch);
        assert!(outcome.reply.contains("Vocast"));
        assert!(outcome.reply.contains("Varmt lead"));
        assert_eq!(*crm.search_terms.lock().expect("lock"), vec!["Vocast".to_string()]);
        assert!(llm.last_prompt().contains("Varmt lead"));
    }

    #[tokio::test]
    async fn doc_qa_turn_uses_retrieved_context() {
        let dir = TempDir::new().expect("tempdir");
        let llm = RecordingLlm::new("Returperioden er 30 dage.");
        let runtime = runtime(populated_retriever(&dir).await, llm.clone(), None);

        let outcome = runtime
            .handle("Hvad er vores returpolitik?")
            .await
            .expect("turn should succeed");

        assert_eq!(outcome.intent, Intent::DocQa);
        assert!(!outcome.reply.is_empty());
        assert!(llm.last_prompt().contains("Returperioden er 30 dage fra leveringsdato."));
    }

    #[tokio::test]
    async fn zero_crm_matches_reply_without_calling_the_model() {
        let dir = TempDir::new().expect("tempdir");
        let llm = RecordingLlm::new("burde ikke blive brugt");
        let crm = Arc::new(ScriptedCrm::with_items(Vec::new()));
        let runtime = runtime(
            populated_retriever(&dir).await,
            llm.clone(),
            Some(crm as Arc<dyn CrmService>),
        );

        let outcome = runtime
            .handle("Find kunden UkendtFirma i Monday")
            .await
            .expect("a miss is still a successful turn");

        assert!(outcome.reply.contains("kunne ikke finde"));
        assert_eq!(llm.prompt_count(), 0);
    }

    #[tokio::test]
    async fn crm_intent_without_client_is_crm_unavailable() {
        let dir = TempDir::new().expect("tempdir");
        let llm = RecordingLlm::new("svar");
        let runtime = runtime(populated_retriever(&dir).await, llm, None);

        let error = runtime
            .handle("Find kunden Vocast i Monday")
            .await
            .expect_err("missing crm key should fail the turn");
        assert!(matches!(error, TurnError::CrmUnavailable(_)));
    }

    #[tokio::test]
    async fn empty_store_surfaces_empty_index() {
        let dir = TempDir::new().expect("tempdir");
        let llm = RecordingLlm::new("svar");
        let runtime = runtime(empty_retriever(&dir).await, llm, None);

        let error = runtime
            .handle("Hvad er vores returpolitik?")
            .await
            .expect_err("empty store should fail the turn");
        assert_eq!(error, TurnError::EmptyIndex);
    }

    #[tokio::test]
    async fn crm_auth_failure_maps_to_crm_auth() {
        let dir = TempDir::new().expect("tempdir");
        let llm = RecordingLlm::new("svar");
        let crm = Arc::new(ScriptedCrm::failing(CrmError::Auth("401".to_string())));
        let runtime =
            runtime(populated_retriever(&dir).await, llm, Some(crm as Arc<dyn CrmService>));

        let error = runtime
            .handle("Find kunden Vocast i Monday")
            .await
            .expect_err("auth failure should fail the turn");
        assert!(matches!(error, TurnError::CrmAuth(_)));
    }

    #[tokio::test]
    async fn board_wide_request_uses_list_all() {
        let dir = TempDir::new().expect("tempdir");
        let llm = RecordingLlm::new("Overblik: Vocast, Acme");
        let crm = Arc::new(ScriptedCrm {
            items: Vec::new(),
            list_items: vec![vocast()],
            search_terms: Mutex::new(Vec::new()),
            error: None,
        });
        let runtime = runtime(
            populated_retriever(&dir).await,
            llm,
            Some(crm.clone() as Arc<dyn CrmService>),
        );

        let outcome = runtime
            .handle("Giv mig et overblik over vores leads i Monday")
            .await
            .expect("turn should succeed");

        assert_eq!(outcome.intent, Intent::CrmSearch);
        assert!(crm.search_terms.lock().expect("lock").is_empty(), "search must not be used");
    }

    #[tokio::test]
    async fn monday_test_phrase_runs_the_connection_test() {
        let dir = TempDir::new().expect("tempdir");
        let llm = RecordingLlm::new("svar");
        let crm = Arc::new(ScriptedCrm::with_items(Vec::new()));
        let runtime = runtime(
            populated_retriever(&dir).await,
            llm.clone(),
            Some(crm as Arc<dyn CrmService>),
        );

        let outcome = runtime.handle("monday test").await.expect("health check");

        assert!(outcome.reply.contains("Monday-forbindelse virker"));
        assert!(outcome.reply.contains("Sanne Ib"));
        assert_eq!(llm.prompt_count(), 0);
    }

    #[tokio::test]
    async fn monday_test_without_key_reports_missing_configuration() {
        let dir = TempDir::new().expect("tempdir");
        let llm = RecordingLlm::new("svar");
        let runtime = runtime(populated_retriever(&dir).await, llm, None);

        let outcome = runtime.handle("monday test").await.expect("health check");
        assert!(outcome.reply.contains("ikke nogen Monday API-nøgle"));
    }
}
