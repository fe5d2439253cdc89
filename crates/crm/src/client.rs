use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use saiborg_core::config::CrmConfig;
use saiborg_core::domain::crm::{CrmAccount, CrmItem};

const DEFAULT_PAGE_LIMIT: u32 = 100;

const ITEM_FIELDS: &str = "id name column_values { id text }";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CrmError {
    #[error("crm transport failed: {0}")]
    Network(String),
    #[error("crm rejected the configured credentials: {0}")]
    Auth(String),
    #[error("crm rate limit hit: {0}")]
    RateLimited(String),
    #[error("crm api error: {0}")]
    Api(String),
    #[error("unexpected crm response shape: {0}")]
    Decode(String),
}

impl CrmError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited(_))
    }
}

/// Read-only operations against the configured board. The trait is the seam
/// the assistant runtime talks to, so tests can script CRM behavior without
/// a network.
#[async_trait]
pub trait CrmService: Send + Sync {
    /// Provider-side text search over item names. Provider relevance order
    /// is preserved; zero matches is an empty sequence, not an error.
    async fn search(&self, term: &str) -> Result<Vec<CrmItem>, CrmError>;

    /// Every item on the board, accumulated across cursor pages.
    async fn list_all(&self) -> Result<Vec<CrmItem>, CrmError>;

    /// Round-trip against the account endpoint, used by health checks.
    async fn connection_test(&self) -> Result<CrmAccount, CrmError>;
}

pub struct MondayClient {
    http: reqwest::Client,
    api_url: String,
    api_key: SecretString,
    board_id: u64,
    page_limit: u32,
    max_retries: u32,
    retry_base_delay_ms: u64,
}

impl MondayClient {
    /// Build a client from configuration. Returns `None` when no API key is
    /// configured, which disables CRM features for the whole process.
    pub fn from_config(config: &CrmConfig) -> Result<Option<Self>, CrmError> {
        let Some(api_key) = &config.api_key else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| CrmError::Network(error.to_string()))?;

        Ok(Some(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: api_key.clone(),
            board_id: config.board_id,
            page_limit: DEFAULT_PAGE_LIMIT,
            max_retries: config.max_retries,
            retry_base_delay_ms: 500,
        }))
    }

    #[doc(hidden)]
    pub fn with_retry_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_base_delay_ms = delay_ms;
        self
    }

    async fn call(&self, query: &str, variables: Value) -> Result<Value, CrmError> {
        let payload = json!({ "query": query, "variables": variables });

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", self.api_key.expose_secret())
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|error| CrmError::Network(error.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(CrmError::Auth(format!("provider returned {status}")));
        }
        if status.as_u16() == 429 {
            return Err(CrmError::RateLimited(format!("provider returned {status}")));
        }
        if status.is_server_error() {
            return Err(CrmError::Network(format!("provider returned {status}")));
        }
        if !status.is_success() {
            return Err(CrmError::Api(format!("unexpected status {status}")));
        }

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|error| CrmError::Decode(error.to_string()))?;

        if let Some(errors) = body.errors.filter(|errors| !errors.is_empty()) {
            let message = errors
                .iter()
                .map(|error| error.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            let lowered = message.to_lowercase();

            if lowered.contains("complexity") || lowered.contains("rate limit") {
                return Err(CrmError::RateLimited(message));
            }
            if lowered.contains("unauthorized") || lowered.contains("not authenticated") {
                return Err(CrmError::Auth(message));
            }
            return Err(CrmError::Api(message));
        }

        body.data.ok_or_else(|| CrmError::Decode("response is missing `data`".to_string()))
    }

    /// Bounded exponential backoff around [`Self::call`]: transient network
    /// failures and rate limiting get up to `max_retries` extra attempts.
    async fn call_with_retry(&self, query: &str, variables: Value) -> Result<Value, CrmError> {
        let mut attempt = 0;
        loop {
            match self.call(query, variables.clone()).await {
                Ok(data) => return Ok(data),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(self.retry_base_delay_ms, attempt);
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retryable crm failure; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn parse_items_page(data: Value, field: PageField) -> Result<ItemsPage, CrmError> {
        match field {
            PageField::Boards => {
                let parsed: BoardsData = serde_json::from_value(data)
                    .map_err(|error| CrmError::Decode(error.to_string()))?;
                let board = parsed
                    .boards
                    .unwrap_or_default()
                    .into_iter()
                    .next()
                    .ok_or_else(|| CrmError::Decode("board not found in response".to_string()))?;
                board
                    .items_page
                    .ok_or_else(|| CrmError::Decode("items_page missing in response".to_string()))
            }
            PageField::NextItemsPage => {
                let parsed: NextPageData = serde_json::from_value(data)
                    .map_err(|error| CrmError::Decode(error.to_string()))?;
                parsed.next_items_page.ok_or_else(|| {
                    CrmError::Decode("next_items_page missing in response".to_string())
                })
            }
        }
    }
}

#[async_trait]
impl CrmService for MondayClient {
    async fn search(&self, term: &str) -> Result<Vec<CrmItem>, CrmError> {
        let term = term.trim();
        if term.is_empty() {
            warn!("empty crm search term; returning no items");
            return Ok(Vec::new());
        }

        let query = format!(
            "query ($boardId: [ID!], $limit: Int, $term: CompareValue!) {{
               boards(ids: $boardId) {{
                 items_page(
                   limit: $limit,
                   query_params: {{ rules: [{{ column_id: \"name\", compare_value: [$term], operator: contains_text }}] }}
                 ) {{ cursor items {{ {ITEM_FIELDS} }} }}
               }}
             }}"
        );

        let data = self
            .call_with_retry(
                &query,
                json!({ "boardId": [self.board_id.to_string()], "limit": self.page_limit, "term": term }),
            )
            .await?;

        let page = Self::parse_items_page(data, PageField::Boards)?;
        info!(term, matches = page.items.len(), "crm search finished");
        Ok(page.items)
    }

    async fn list_all(&self) -> Result<Vec<CrmItem>, CrmError> {
        let first_query = format!(
            "query ($boardId: [ID!], $limit: Int) {{
               boards(ids: $boardId) {{
                 items_page(limit: $limit) {{ cursor items {{ {ITEM_FIELDS} }} }}
               }}
             }}"
        );

        let data = self
            .call_with_retry(
                &first_query,
                json!({ "boardId": [self.board_id.to_string()], "limit": self.page_limit }),
            )
            .await?;
        let mut page = Self::parse_items_page(data, PageField::Boards)?;

        let mut items = page.items;
        while let Some(cursor) = page.cursor.take().filter(|cursor| !cursor.is_empty()) {
            let next_query = format!(
                "query ($cursor: String!, $limit: Int) {{
                   next_items_page(cursor: $cursor, limit: $limit) {{ cursor items {{ {ITEM_FIELDS} }} }}
                 }}"
            );

            let data = self
                .call_with_retry(
                    &next_query,
                    json!({ "cursor": cursor, "limit": self.page_limit }),
                )
                .await?;
            page = Self::parse_items_page(data, PageField::NextItemsPage)?;
            items.extend(page.items.drain(..));
        }

        info!(board_id = self.board_id, items = items.len(), "fetched full board");
        Ok(items)
    }

    async fn connection_test(&self) -> Result<CrmAccount, CrmError> {
        let data = self
            .call_with_retry("query { me { name email } }", json!({}))
            .await?;

        let parsed: MeData =
            serde_json::from_value(data).map_err(|error| CrmError::Decode(error.to_string()))?;
        parsed
            .me
            .ok_or_else(|| CrmError::Auth("provider returned no account info".to_string()))
    }
}

fn backoff_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.min(8);
    let multiplier = 1_u64 << exponent;
    Duration::from_millis(base_delay_ms.saturating_mul(multiplier).min(5_000))
}

enum PageField {
    Boards,
    NextItemsPage,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct BoardsData {
    boards: Option<Vec<BoardNode>>,
}

#[derive(Debug, Deserialize)]
struct BoardNode {
    items_page: Option<ItemsPage>,
}

#[derive(Debug, Deserialize)]
struct ItemsPage {
    cursor: Option<String>,
    items: Vec<CrmItem>,
}

#[derive(Debug, Deserialize)]
struct NextPageData {
    next_items_page: Option<ItemsPage>,
}

#[derive(Debug, Deserialize)]
struct MeData {
    me: Option<CrmAccount>,
}
