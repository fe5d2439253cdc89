//! Core domain for the saiborg assistant.
//!
//! Everything here is pure and deterministic: configuration loading, the
//! per-turn error taxonomy, the shared domain types, and the keyword-based
//! intent router. Network and storage concerns live in the sibling crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod router;

pub use domain::chunk::{ChunkId, Citation, DocumentChunk};
pub use domain::crm::{ColumnValue, CrmAccount, CrmItem, ItemId};
pub use domain::turn::{Intent, TurnOutcome};
pub use errors::TurnError;
pub use router::{IntentRouter, RoutedIntent};
