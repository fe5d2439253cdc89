use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use saiborg_core::config::LlmConfig;
use saiborg_index::embedder::{EmbedError, Embedder};

use crate::llm::{LlmClient, LlmError};

/// HTTP client for the Google Generative Language API. One instance serves
/// both the completion side (`generateContent`) and the embedding side
/// (`embedContent`), so indexer and retriever share the same provider.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    embedding_model: String,
}

impl GeminiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            embedding_model: normalize_model_name(&config.embedding_model),
        })
    }

    /// Known output dimensionalities for the embedding models we target.
    pub fn embedding_dimension(model: &str) -> usize {
        match normalize_model_name(model).as_str() {
            "text-embedding-004" => 768,
            "gemini-embedding-001" => 3072,
            _ => 768,
        }
    }

    async fn post_json<T: Serialize>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> Result<(u16, String), LlmError> {
        let url = format!(
            "{}/{}?key={}",
            self.base_url,
            endpoint,
            self.api_key.expose_secret()
        );

        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;
        Ok((status, body))
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let payload = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part { text: prompt.to_string() }],
            }],
            generation_config: GenerationConfig { temperature: 0.2, max_output_tokens: 2048 },
        };

        let endpoint = format!("models/{}:generateContent", self.model);
        let (status, body) = self.post_json(&endpoint, &payload).await?;

        if !(200..300).contains(&status) {
            return Err(LlmError::Provider { status, message: truncate_body(&body) });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|error| LlmError::Provider { status, message: error.to_string() })?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::Empty)?;

        debug!(model = %self.model, chars = text.len(), "gemini completion received");
        Ok(text)
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    fn model(&self) -> &str {
        &self.embedding_model
    }

    fn dimension(&self) -> usize {
        Self::embedding_dimension(&self.embedding_model)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let payload = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: EmbedContent { parts: vec![Part { text: text.to_string() }] },
        };

        let endpoint = format!("models/{}:embedContent", self.embedding_model);
        let (status, body) = self
            .post_json(&endpoint, &payload)
            .await
            .map_err(|error| EmbedError::Transport(error.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(EmbedError::Provider { status, message: truncate_body(&body) });
        }

        let parsed: EmbedResponse = serde_json::from_str(&body)
            .map_err(|error| EmbedError::Provider { status, message: error.to_string() })?;

        if parsed.embedding.values.is_empty() {
            return Err(EmbedError::Empty);
        }
        Ok(parsed.embedding.values)
    }
}

/// Accept both `text-embedding-004` and the `models/`-prefixed form the
/// provider uses in payloads.
fn normalize_model_name(model: &str) -> String {
    model.trim().trim_start_matches("models/").to_string()
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut cut = MAX;
    while cut > 0 && !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body[..cut].to_string()
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}
