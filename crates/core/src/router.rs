use regex::Regex;

use crate::domain::turn::Intent;

/// Trigger phrases, lowercased. These mirror the phrasing the deployment
/// actually sees (Danish with a few English variants) and are policy, not
/// law: reordering the tie-break below is a configuration decision.
const CRM_GATE_TERMS: &[&str] = &["monday", "crm"];

const OVERVIEW_PHRASES: &[&str] = &[
    "alle kunder",
    "alle leads",
    "hvilke leads har vi",
    "hvilke kunder har vi",
    "overblik over vores leads",
    "overblik over kunder",
];

const EMAIL_PHRASES: &[&str] = &[
    "skriv en mail",
    "skriv en e-mail",
    "skriv email",
    "skriv en email",
    "formuler en mail",
    "lav en mail",
    "follow up mail",
    "opfølgningsmail",
];

const MEETING_PHRASES: &[&str] = &[
    "forbered møde",
    "forberedelse til møde",
    "mødeforberedelse",
    "prepare meeting",
    "prepare for meeting",
    "salgsmøde",
    "kundemøde",
];

const NEXT_STEP_PHRASES: &[&str] = &[
    "næste skridt",
    "next steps",
    "hvad gør vi nu",
    "hvad er næste skridt",
    "hvad bør jeg gøre nu",
];

/// Connectors that terminate a customer name inside a sentence.
const NAME_STOP_WORDS: &[&str] = &[" i monday", " i ", " og ", " hvor ", " som ", " der "];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutedIntent {
    pub intent: Intent,
    /// Candidate CRM entity extracted from the message. `None` for document
    /// Q&A and for board-wide listings.
    pub entity: Option<String>,
    /// `true` when the message asks for the whole board instead of a single
    /// customer lookup.
    pub board_wide: bool,
}

/// Deterministic keyword router. No learning, no adaptation; the rule set is
/// fixed per deployment.
#[derive(Debug)]
pub struct IntentRouter {
    kunde_with_connector: Regex,
    kunde_loose: Regex,
    find_name: Regex,
    capitalized_word: Regex,
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentRouter {
    pub fn new() -> Self {
        Self {
            kunde_with_connector: Regex::new(
                r"(?i)kunde[n]?\s+([A-Za-z0-9ÆØÅæøå][A-Za-z0-9ÆØÅæøå_-]*(?:\s+[A-Za-z0-9ÆØÅæøå][A-Za-z0-9ÆØÅæøå_-]*)*?)(?:\s+(?:i\s+monday|og|hvor|som|der))",
            )
            .expect("kunde-with-connector pattern is static"),
            kunde_loose: Regex::new(r"(?i)kunde[n]?\s+([A-Za-z0-9ÆØÅæøå][A-Za-z0-9ÆØÅæøå ._-]+)")
                .expect("kunde-loose pattern is static"),
            find_name: Regex::new(r"(?i)find\s+([A-Za-zÆØÅæøå][A-Za-z0-9ÆØÅæøå]+)")
                .expect("find-name pattern is static"),
            capitalized_word: Regex::new(r"\b([A-ZÆØÅ][A-Za-z0-9ÆØÅæøå]+)\b")
                .expect("capitalized-word pattern is static"),
        }
    }

    /// Classify a message into exactly one intent.
    ///
    /// Tie-break order: entity intents (email, meeting prep, next steps)
    /// win over generic CRM search, which wins over document Q&A.
    pub fn route(&self, text: &str) -> RoutedIntent {
        let lower = text.to_lowercase();

        if !contains_any(&lower, CRM_GATE_TERMS) {
            return RoutedIntent { intent: Intent::DocQa, entity: None, board_wide: false };
        }

        let board_wide = contains_any(&lower, OVERVIEW_PHRASES);
        let intent = if contains_any(&lower, EMAIL_PHRASES) {
            Intent::EmailDraft
        } else if contains_any(&lower, MEETING_PHRASES) {
            Intent::MeetingPrep
        } else if contains_any(&lower, NEXT_STEP_PHRASES) {
            Intent::NextSteps
        } else {
            Intent::CrmSearch
        };

        let entity = if board_wide { None } else { Some(self.extract_entity(text)) };

        RoutedIntent { intent, entity, board_wide }
    }

    /// Extract a candidate customer name from a sentence.
    ///
    /// The cascade mirrors how users actually phrase lookups: an explicit
    /// `kunde[n] X` reference, then `find X`, then the text before a Danish
    /// connector, then any capitalized word, then the first meaningful word.
    pub fn extract_entity(&self, text: &str) -> String {
        let t = text.trim().trim_start_matches(['-', '–', '—', ' ']).trim();
        let lower = t.to_lowercase();

        if let Some(captures) = self.kunde_with_connector.captures(t) {
            return trim_name(&captures[1]);
        }

        if let Some(captures) = self.kunde_loose.captures(t) {
            let mut name = captures[1].to_string();
            let name_lower = name.to_lowercase();
            for stop_word in NAME_STOP_WORDS {
                if let Some(stop_idx) = name_lower.find(stop_word) {
                    name.truncate(stop_idx);
                    break;
                }
            }
            return trim_name(&name);
        }

        if let Some(captures) = self.find_name.captures(t) {
            let mut name = captures[1].to_string();
            let name_lower = name.to_lowercase();
            for stop_word in &NAME_STOP_WORDS[1..] {
                if let Some(stop_idx) = name_lower.find(stop_word) {
                    name.truncate(stop_idx);
                    break;
                }
            }
            return trim_name(&name);
        }

        let earliest_idx = NAME_STOP_WORDS
            .iter()
            .filter_map(|connector| lower.find(*connector))
            .min()
            .unwrap_or(t.len());

        if earliest_idx < t.len() {
            let before = t[..earliest_idx].trim();
            let before = before
                .strip_prefix("find ")
                .or_else(|| before.strip_prefix("Find "))
                .unwrap_or(before)
                .trim();

            let parts: Vec<&str> = before.split_whitespace().collect();
            let capitalized: Vec<&str> = parts
                .iter()
                .copied()
                .filter(|part| part.chars().next().is_some_and(char::is_uppercase))
                .collect();

            let name = if !capitalized.is_empty() {
                capitalized.join(" ")
            } else if let Some(last) = parts.last() {
                (*last).to_string()
            } else {
                before.to_string()
            };
            return trim_name(&name);
        }

        if let Some(captures) = self.capitalized_word.captures(t) {
            return trim_name(&captures[1]);
        }

        for part in t.split_whitespace() {
            if part.chars().count() > 2 && part.chars().next().is_some_and(char::is_alphanumeric) {
                return trim_name(part);
            }
        }

        trim_name(t)
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn trim_name(name: &str) -> String {
    name.trim_matches([' ', '?', '!', '.', ':', ',', ';']).to_string()
}

#[cfg(test)]
mod tests {
    use super::{IntentRouter, RoutedIntent};
    use crate::domain::turn::Intent;

    fn route(text: &str) -> RoutedIntent {
        IntentRouter::new().route(text)
    }

    #[test]
    fn plain_question_defaults_to_doc_qa() {
        let routed = route("Hvad er vores returpolitik?");
        assert_eq!(routed.intent, Intent::DocQa);
        assert_eq!(routed.entity, None);
        assert!(!routed.board_wide);
    }

    #[test]
    fn crm_search_with_entity_extraction() {
        let routed = route("Find kunden Vocast i Monday");
        assert_eq!(routed.intent, Intent::CrmSearch);
        assert_eq!(routed.entity.as_deref(), Some("Vocast"));
        assert!(!routed.board_wide);
    }

    #[test]
    fn overview_phrase_requests_the_whole_board() {
        let routed = route("Giv mig et overblik over vores leads i Monday");
        assert_eq!(routed.intent, Intent::CrmSearch);
        assert_eq!(routed.entity, None);
        assert!(routed.board_wide);
    }

    #[test]
    fn email_phrase_beats_generic_crm_search() {
        let routed = route("Skriv en mail til kunden Vocast i Monday");
        assert_eq!(routed.intent, Intent::EmailDraft);
        assert_eq!(routed.entity.as_deref(), Some("Vocast"));
    }

    #[test]
    fn meeting_phrase_routes_to_meeting_prep() {
        let routed = route("Hjælp mig med mødeforberedelse for kunden Acme i Monday");
        assert_eq!(routed.intent, Intent::MeetingPrep);
        assert_eq!(routed.entity.as_deref(), Some("Acme"));
    }

    #[test]
    fn next_steps_phrase_routes_to_next_steps() {
        let routed = route("Hvad er næste skridt for kunden Vocast i CRM?");
        assert_eq!(routed.intent, Intent::NextSteps);
        assert_eq!(routed.entity.as_deref(), Some("Vocast"));
    }

    #[test]
    fn doc_qa_wins_without_a_crm_gate_term() {
        // Email phrasing alone is not CRM-related without monday/crm.
        let routed = route("Skriv en mail om vores åbningstider");
        assert_eq!(routed.intent, Intent::DocQa);
    }

    #[test]
    fn entity_extraction_handles_kunde_without_connector() {
        let router = IntentRouter::new();
        assert_eq!(router.extract_entity("Hvad er status på kunden Vocast?"), "Vocast");
    }

    #[test]
    fn entity_extraction_stops_at_og_connector() {
        let router = IntentRouter::new();
        assert_eq!(
            router.extract_entity("kunden Vocast og deres seneste ordre"),
            "Vocast"
        );
    }

    #[test]
    fn entity_extraction_handles_danish_characters() {
        let router = IntentRouter::new();
        assert_eq!(router.extract_entity("find kunden Sønderby i monday"), "Sønderby");
    }

    #[test]
    fn entity_extraction_falls_back_to_capitalized_word() {
        let router = IntentRouter::new();
        assert_eq!(router.extract_entity("status for Vocast tak"), "Vocast");
    }

    #[test]
    fn entity_extraction_trims_trailing_punctuation() {
        let router = IntentRouter::new();
        assert_eq!(router.extract_entity("find Vocast!"), "Vocast");
    }

    #[test]
    fn entity_extraction_takes_text_before_connector() {
        let router = IntentRouter::new();
        assert_eq!(router.extract_entity("Vocast i monday"), "Vocast");
    }
}
