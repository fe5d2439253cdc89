use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use saiborg_core::config::SlackConfig;

use crate::events::{EventHandlerError, ReplySink};

const DEFAULT_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack transport failed: {0}")]
    Transport(String),
    #[error("slack api call `{method}` failed: {error}")]
    Api { method: String, error: String },
}

/// Bot identity as reported by `auth.test`. The user id is what mention
/// stripping and loop prevention key on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthInfo {
    pub user_id: String,
    pub user: Option<String>,
}

/// Thin Slack Web API client: identity lookup, reply posting and the
/// Socket Mode handshake. The WebSocket itself stays behind the
/// [`crate::socket::SocketTransport`] seam.
#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
    app_token: SecretString,
}

impl SlackApiClient {
    pub fn from_config(config: &SlackConfig) -> Result<Self, SlackApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            bot_token: config.bot_token.clone(),
            app_token: config.app_token.clone(),
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn auth_test(&self) -> Result<AuthInfo, SlackApiError> {
        let response: AuthTestResponse =
            self.call("auth.test", &json!({}), self.bot_token.expose_secret()).await?;

        let user_id = response.user_id.ok_or_else(|| SlackApiError::Api {
            method: "auth.test".to_string(),
            error: "response is missing user_id".to_string(),
        })?;
        Ok(AuthInfo { user_id, user: response.user })
    }

    pub async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<(), SlackApiError> {
        let mut payload = json!({ "channel": channel, "text": text });
        if let Some(thread_ts) = thread_ts {
            payload["thread_ts"] = json!(thread_ts);
        }

        let _: PostMessageResponse =
            self.call("chat.postMessage", &payload, self.bot_token.expose_secret()).await?;
        debug!(channel, "message posted");
        Ok(())
    }

    /// Socket Mode handshake: returns the WSS URL a transport implementation
    /// should connect to. Requires the app-level token.
    pub async fn connections_open(&self) -> Result<String, SlackApiError> {
        let response: ConnectionsOpenResponse = self
            .call("apps.connections.open", &json!({}), self.app_token.expose_secret())
            .await?;

        response.url.ok_or_else(|| SlackApiError::Api {
            method: "apps.connections.open".to_string(),
            error: "response is missing url".to_string(),
        })
    }

    async fn call<T: for<'de> Deserialize<'de> + OkCheck>(
        &self,
        method: &str,
        payload: &serde_json::Value,
        token: &str,
    ) -> Result<T, SlackApiError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), method);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlackApiError::Api {
                method: method.to_string(),
                error: format!("unexpected status {status}"),
            });
        }

        let parsed: T = response
            .json()
            .await
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;

        if let Some(error) = parsed.api_error() {
            return Err(SlackApiError::Api { method: method.to_string(), error });
        }
        Ok(parsed)
    }
}

/// Every Web API response carries `ok` plus an optional error code.
trait OkCheck {
    fn api_error(&self) -> Option<String>;
}

macro_rules! ok_check {
    ($type:ty) => {
        impl OkCheck for $type {
            fn api_error(&self) -> Option<String> {
                if self.ok {
                    None
                } else {
                    Some(self.error.clone().unwrap_or_else(|| "unknown_error".to_string()))
                }
            }
        }
    };
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    ok: bool,
    error: Option<String>,
    user_id: Option<String>,
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectionsOpenResponse {
    ok: bool,
    error: Option<String>,
    url: Option<String>,
}

ok_check!(AuthTestResponse);
ok_check!(PostMessageResponse);
ok_check!(ConnectionsOpenResponse);

#[async_trait]
impl ReplySink for SlackApiClient {
    async fn post(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<(), EventHandlerError> {
        self.post_message(channel, Some(thread_ts), text)
            .await
            .map_err(|error| EventHandlerError::Reply(error.to_string()))
    }
}
