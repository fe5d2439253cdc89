use thiserror::Error;

/// Everything that can go wrong while handling a single conversation turn.
///
/// Every variant maps to exactly one user-visible reply; the event gateway is
/// the only place allowed to perform that mapping, so a failed turn always
/// ends as Failed-and-Reported instead of crashing the process.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("crm is not configured: {0}")]
    CrmUnavailable(String),
    #[error("crm rejected the configured credentials: {0}")]
    CrmAuth(String),
    #[error("transient network failure: {0}")]
    Network(String),
    #[error("vector store holds no chunks")]
    EmptyIndex,
    #[error("language model call failed: {0}")]
    Llm(String),
    #[error("turn exceeded the wall-clock budget of {budget_secs}s")]
    Timeout { budget_secs: u64 },
    #[error("internal failure: {0}")]
    Internal(String),
}

impl TurnError {
    /// Danish reply posted back to the channel for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::CrmUnavailable(_) => {
                "Jeg har ikke nogen Monday API-nøgle konfigureret, så jeg kan ikke læse CRM-data endnu."
                    .to_string()
            }
            Self::CrmAuth(_) => {
                "CRM-tjenesten er ikke tilgængelig lige nu – tjek venligst API-nøglen.".to_string()
            }
            Self::Network(_) => {
                "Jeg kunne ikke nå de eksterne tjenester lige nu. Prøv igen om lidt.".to_string()
            }
            Self::EmptyIndex => {
                "Jeg har ingen vidensbase endnu – der er ikke indekseret nogen dokumenter."
                    .to_string()
            }
            Self::Llm(_) => {
                "Beklager, jeg kunne ikke generere et svar lige nu. Prøv igen senere.".to_string()
            }
            Self::Timeout { .. } => {
                "Det tog for lang tid at besvare din forespørgsel, så jeg gav op. Prøv igen."
                    .to_string()
            }
            Self::Internal(_) => "Der skete en uventet fejl. Prøv igen senere.".to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::CrmUnavailable(_) => "crm_unavailable",
            Self::CrmAuth(_) => "crm_auth",
            Self::Network(_) => "network",
            Self::EmptyIndex => "empty_index",
            Self::Llm(_) => "llm",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TurnError;

    #[test]
    fn empty_index_maps_to_knowledge_base_reply() {
        let message = TurnError::EmptyIndex.user_message();
        assert!(message.contains("vidensbase"));
    }

    #[test]
    fn llm_failure_maps_to_apology() {
        let message = TurnError::Llm("upstream 500".to_string()).user_message();
        assert!(message.starts_with("Beklager"));
    }

    #[test]
    fn every_variant_has_a_stable_kind() {
        let variants = [
            TurnError::CrmUnavailable(String::new()),
            TurnError::CrmAuth(String::new()),
            TurnError::Network(String::new()),
            TurnError::EmptyIndex,
            TurnError::Llm(String::new()),
            TurnError::Timeout { budget_secs: 60 },
            TurnError::Internal(String::new()),
        ];

        let kinds: Vec<&str> = variants.iter().map(TurnError::kind).collect();
        let mut deduped = kinds.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(kinds.len(), deduped.len(), "kinds must be unique per variant");
    }
}
