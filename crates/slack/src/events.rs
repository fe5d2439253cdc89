use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use saiborg_core::domain::turn::TurnOutcome;
use saiborg_core::errors::TurnError;

/// Posted before the pipeline runs so the channel sees the bot is working.
const THINKING_REPLY: &str = "🤔 Saiborg er i gang med at tænke...";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    AppMention(MessageEvent),
    DirectMessage(MessageEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::AppMention(_) => SlackEventType::AppMention,
            Self::DirectMessage(_) => SlackEventType::DirectMessage,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    AppMention,
    DirectMessage,
    Unsupported,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel: String,
    pub user: String,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    /// Set when the message was authored by a bot integration.
    pub bot_id: Option<String>,
}

impl MessageEvent {
    /// Replies land in the thread the message belongs to, starting one on
    /// the original message when none exists yet.
    pub fn reply_thread_ts(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid envelope json: {0}")]
    Json(String),
    #[error("envelope is missing `{0}`")]
    MissingField(&'static str),
}

/// Parse one raw Socket Mode frame into a typed envelope. Anything that is
/// not an `events_api` mention or direct message becomes `Unsupported` so
/// the runner can acknowledge it without acting.
pub fn parse_envelope(raw: &str) -> Result<SlackEnvelope, ParseError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|error| ParseError::Json(error.to_string()))?;

    let envelope_id = value
        .get("envelope_id")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingField("envelope_id"))?
        .to_string();

    let envelope_type = value.get("type").and_then(Value::as_str).unwrap_or_default();
    if envelope_type != "events_api" {
        return Ok(SlackEnvelope {
            envelope_id,
            event: SlackEvent::Unsupported { event_type: envelope_type.to_string() },
        });
    }

    let event = value
        .pointer("/payload/event")
        .ok_or(ParseError::MissingField("payload.event"))?;
    let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default();

    let message = MessageEvent {
        channel: string_field(event, "channel"),
        user: string_field(event, "user"),
        text: string_field(event, "text"),
        ts: string_field(event, "ts"),
        thread_ts: event.get("thread_ts").and_then(Value::as_str).map(str::to_string),
        bot_id: event.get("bot_id").and_then(Value::as_str).map(str::to_string),
    };

    let channel_type = event.get("channel_type").and_then(Value::as_str).unwrap_or_default();
    let subtype = event.get("subtype").and_then(Value::as_str).unwrap_or_default();

    let event = match event_type {
        "app_mention" => SlackEvent::AppMention(message),
        "message" if channel_type == "im" && subtype.is_empty() => {
            SlackEvent::DirectMessage(message)
        }
        other => SlackEvent::Unsupported { event_type: other.to_string() },
    };

    Ok(SlackEnvelope { envelope_id, event })
}

fn string_field(event: &Value, key: &str) -> String {
    event.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Replied,
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("reply delivery failed: {0}")]
    Reply(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// The assistant pipeline behind the gateway. Implemented by the server on
/// top of the agent runtime; tests script it directly.
#[async_trait]
pub trait MentionService: Send + Sync {
    async fn handle_message(&self, text: &str) -> Result<TurnOutcome, TurnError>;
}

/// Outbound reply channel, implemented by the Web API client.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn post(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<(), EventHandlerError>;
}

/// Gateway for mention and direct-message events.
///
/// Strips the bot mention token, refuses the bot's own traffic, enforces the
/// per-turn wall-clock budget, and converts every pipeline failure into a
/// single user-facing reply. A handled event always terminates as Replied or
/// Failed-and-Reported; it never crashes the event loop.
pub struct MentionHandler<S> {
    service: S,
    reply: Arc<dyn ReplySink>,
    bot_user_id: String,
    event_type: SlackEventType,
    turn_timeout: Duration,
}

impl<S> MentionHandler<S>
where
    S: MentionService,
{
    pub fn for_mentions(
        service: S,
        reply: Arc<dyn ReplySink>,
        bot_user_id: impl Into<String>,
        turn_timeout: Duration,
    ) -> Self {
        Self {
            service,
            reply,
            bot_user_id: bot_user_id.into(),
            event_type: SlackEventType::AppMention,
            turn_timeout,
        }
    }

    pub fn for_direct_messages(
        service: S,
        reply: Arc<dyn ReplySink>,
        bot_user_id: impl Into<String>,
        turn_timeout: Duration,
    ) -> Self {
        Self {
            service,
            reply,
            bot_user_id: bot_user_id.into(),
            event_type: SlackEventType::DirectMessage,
            turn_timeout,
        }
    }

    fn strip_bot_mention(&self, text: &str) -> String {
        text.replace(&format!("<@{}>", self.bot_user_id), "").trim().to_string()
    }

    fn is_own_traffic(&self, event: &MessageEvent) -> bool {
        event.bot_id.is_some() || event.user.is_empty() || event.user == self.bot_user_id
    }
}

#[async_trait]
impl<S> EventHandler for MentionHandler<S>
where
    S: MentionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        self.event_type
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let (SlackEvent::AppMention(event) | SlackEvent::DirectMessage(event)) = &envelope.event
        else {
            return Ok(HandlerResult::Ignored);
        };

        if self.is_own_traffic(event) {
            debug!(
                correlation_id = %ctx.correlation_id,
                channel_id = %event.channel,
                "skipping bot-authored message"
            );
            return Ok(HandlerResult::Processed);
        }

        let text = self.strip_bot_mention(&event.text);
        if text.is_empty() {
            return Ok(HandlerResult::Processed);
        }

        info!(
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel,
            thread_ts = %event.reply_thread_ts(),
            "handling message"
        );

        if let Err(error) =
            self.reply.post(&event.channel, event.reply_thread_ts(), THINKING_REPLY).await
        {
            warn!(
                correlation_id = %ctx.correlation_id,
                error = %error,
                "could not post thinking message; continuing"
            );
        }

        let outcome: Result<TurnOutcome, TurnError> =
            match tokio::time::timeout(self.turn_timeout, self.service.handle_message(&text)).await
            {
                Ok(result) => result,
                Err(_elapsed) => {
                    Err(TurnError::Timeout { budget_secs: self.turn_timeout.as_secs() })
                }
            };

        let reply_text = match outcome {
            Ok(outcome) => {
                info!(
                    correlation_id = %ctx.correlation_id,
                    intent = outcome.intent.label(),
                    "turn finished"
                );
                outcome.reply
            }
            Err(error) => {
                warn!(
                    correlation_id = %ctx.correlation_id,
                    kind = error.kind(),
                    error = %error,
                    "turn failed; replying with error message"
                );
                error.user_message()
            }
        };

        self.reply.post(&event.channel, event.reply_thread_ts(), &reply_text).await?;
        Ok(HandlerResult::Replied)
    }
}
