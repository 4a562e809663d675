//! Multi-turn question answering over one or more documents.
use super::{ensure_text, render_documents, PromptFeature, SourceText};
use crate::bridge::Translatable;
use crate::conversation::{ConversationTurn, Role};
use crate::util::fill_template;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const ASK_TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/ask.md"));

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
}

impl From<&ConversationTurn> for HistoryEntry {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role(),
            text: turn.text().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AskRequest {
    pub documents: Vec<SourceText>,
    pub history: Vec<HistoryEntry>,
    pub question: String,
}

impl Translatable for AskRequest {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        for entry in &mut self.history {
            entry.text.text_fields(out);
        }
        self.question.text_fields(out);
    }
}

/// Answer plus the name of the document it was drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskAnswer {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document: Option<String>,
}

impl Translatable for AskAnswer {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        self.answer.text_fields(out);
    }
}

pub struct Ask;

impl PromptFeature for Ask {
    const NAME: &'static str = "ask";
    type Input = AskRequest;
    type Output = AskAnswer;

    fn render(input: &AskRequest) -> String {
        let documents = render_documents(&input.documents);
        let history = render_history(&input.history);
        fill_template(
            ASK_TEMPLATE,
            &[
                ("documents", documents.as_str()),
                ("history", history.as_str()),
                ("question", input.question.as_str()),
            ],
        )
    }

    fn check(output: &AskAnswer) -> Result<()> {
        ensure_text(&output.answer, "answer")
    }
}

fn render_history(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "(no earlier questions)".to_string();
    }
    let mut out = String::new();
    for entry in history {
        let speaker = match entry.role {
            Role::User => "User",
            Role::Model => "Assistant",
        };
        let _ = writeln!(out, "{speaker}: {}", entry.text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AskRequest {
        AskRequest {
            documents: vec![SourceText::new("lease.txt", "Rent is due on the 1st.")],
            history: vec![
                HistoryEntry {
                    role: Role::User,
                    text: "When is rent due?".to_string(),
                },
                HistoryEntry {
                    role: Role::Model,
                    text: "On the 1st.".to_string(),
                },
            ],
            question: "Is there a late fee?".to_string(),
        }
    }

    #[test]
    fn prompt_carries_documents_history_and_question() {
        let prompt = Ask::render(&request());
        assert!(prompt.contains("### lease.txt"));
        assert!(prompt.contains("User: When is rent due?\nAssistant: On the 1st."));
        assert!(prompt.ends_with("Is there a late fee?\n"));
    }

    #[test]
    fn documents_are_not_translated() {
        let mut req = request();
        let mut leaves = Vec::new();
        req.text_fields(&mut leaves);
        let seen: Vec<&str> = leaves.iter().map(|s| s.as_str()).collect();
        assert_eq!(seen, vec!["When is rent due?", "On the 1st.", "Is there a late fee?"]);
    }

    #[test]
    fn attribution_is_opaque() {
        let mut answer: AskAnswer =
            serde_json::from_str(r#"{"answer":"Yes","sourceDocument":"lease.txt"}"#).unwrap();
        let mut leaves = Vec::new();
        answer.text_fields(&mut leaves);
        assert_eq!(leaves.len(), 1);
        assert!(Ask::check(&AskAnswer {
            answer: " ".to_string(),
            source_document: None
        })
        .is_err());
    }
}
