//! Slack integration - Socket Mode bot interface.
//!
//! - **Socket Mode** (`socket`) - transport seam and event loop with
//!   reconnection logic (no public URL needed)
//! - **Events** (`events`) - envelope parsing, dispatching, and the mention
//!   gateway that runs the assistant pipeline per event
//! - **Web API** (`api`) - `auth.test`, `chat.postMessage` and
//!   `apps.connections.open` over HTTP
//!
//! # Getting started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Socket Mode and subscribe to `app_mention` and `message.im`
//! 3. Set env vars: `SAIBORG_SLACK_APP_TOKEN`, `SAIBORG_SLACK_BOT_TOKEN`

pub mod api;
pub mod events;
pub mod socket;
