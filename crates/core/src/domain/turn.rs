use serde::{Deserialize, Serialize};

/// Classified purpose of an incoming message. Exactly one intent is chosen
/// per turn; document Q&A is the default when nothing else matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    DocQa,
    CrmSearch,
    EmailDraft,
    MeetingPrep,
    NextSteps,
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DocQa => "doc_qa",
            Self::CrmSearch => "crm_search",
            Self::EmailDraft => "email_draft",
            Self::MeetingPrep => "meeting_prep",
            Self::NextSteps => "next_steps",
        }
    }

    /// Intents that read CRM data before generating a reply.
    pub fn needs_crm(&self) -> bool {
        !matches!(self, Self::DocQa)
    }
}

/// Result of one fully handled conversation turn. Exists only while the
/// event is in flight; nothing here is persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub intent: Intent,
    pub reply: String,
}
