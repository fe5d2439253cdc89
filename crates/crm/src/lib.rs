//! Board CRM integration (Monday-style GraphQL API).
//!
//! Read-only access to one configured board: provider-side name search,
//! full listing via cursor pagination, and a connection test against the
//! account endpoint. Transient failures and provider rate limiting are
//! retried with bounded exponential backoff; credential failures are not.

pub mod client;

pub use client::{CrmError, CrmService, MondayClient};
