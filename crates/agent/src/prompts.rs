use serde_json::{json, Value};
use tera::{Context, Tera};
use thiserror::Error;

use saiborg_core::domain::crm::CrmItem;
use saiborg_core::domain::turn::Intent;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template error: {0}")]
    Template(String),
}

/// Per-intent prompt templates, embedded at compile time so the binary has
/// no runtime template directory to locate.
pub struct PromptLibrary {
    tera: Tera,
}

impl PromptLibrary {
    pub fn new() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        let templates: [(&str, &str); 5] = [
            ("doc_qa", include_str!("../templates/doc_qa.txt.tera")),
            ("crm_summary", include_str!("../templates/crm_summary.txt.tera")),
            ("email_followup", include_str!("../templates/email_followup.txt.tera")),
            ("meeting_prep", include_str!("../templates/meeting_prep.txt.tera")),
            ("next_steps", include_str!("../templates/next_steps.txt.tera")),
        ];

        for (name, raw) in templates {
            tera.add_raw_template(name, raw)
                .map_err(|error| PromptError::Template(error.to_string()))?;
        }

        Ok(Self { tera })
    }

    /// Document Q&A prompt with the retrieved context embedded verbatim.
    pub fn doc_qa(&self, user_text: &str, context: &str) -> Result<String, PromptError> {
        let mut ctx = Context::new();
        ctx.insert("user_text", user_text);
        ctx.insert("context", context);
        self.render("doc_qa", &ctx)
    }

    /// CRM prompt for the given intent, with the board items serialized the
    /// way the templates expect: name, id and a flat column map per item.
    pub fn crm(
        &self,
        intent: Intent,
        user_text: &str,
        items: &[CrmItem],
    ) -> Result<String, PromptError> {
        let template = match intent {
            Intent::EmailDraft => "email_followup",
            Intent::MeetingPrep => "meeting_prep",
            Intent::NextSteps => "next_steps",
            Intent::CrmSearch | Intent::DocQa => "crm_summary",
        };

        let serialized = serde_json::to_string_pretty(&structure_items(items))
            .map_err(|error| PromptError::Template(error.to_string()))?;

        let mut ctx = Context::new();
        ctx.insert("user_text", user_text);
        ctx.insert("items", &serialized);
        self.render(template, &ctx)
    }

    fn render(&self, template: &str, ctx: &Context) -> Result<String, PromptError> {
        self.tera
            .render(template, ctx)
            .map_err(|error| PromptError::Template(error.to_string()))
    }
}

fn structure_items(items: &[CrmItem]) -> Vec<Value> {
    items
        .iter()
        .map(|item| {
            let columns: serde_json::Map<String, Value> = item
                .column_values
                .iter()
                .map(|column| {
                    (
                        column.id.clone(),
                        column.text.clone().map(Value::String).unwrap_or(Value::Null),
                    )
                })
                .collect();

            json!({ "name": item.name, "id": item.id.0, "columns": columns })
        })
        .collect()
}
