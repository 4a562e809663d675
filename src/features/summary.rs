use super::{ensure_text, PromptFeature, SourceText};
use crate::bridge::Translatable;
use crate::util::fill_template;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

const SUMMARY_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/document_summary.md"
));

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRequest {
    pub document: SourceText,
}

impl Translatable for SummaryRequest {
    fn text_fields<'a>(&'a mut self, _out: &mut Vec<&'a mut String>) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

impl Translatable for DocumentSummary {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        self.summary.text_fields(out);
        self.key_points.text_fields(out);
    }
}

pub struct Summarize;

impl PromptFeature for Summarize {
    const NAME: &'static str = "document_summary";
    type Input = SummaryRequest;
    type Output = DocumentSummary;

    fn render(input: &SummaryRequest) -> String {
        fill_template(SUMMARY_TEMPLATE, &[("document", input.document.text.as_str())])
    }

    fn check(output: &DocumentSummary) -> Result<()> {
        ensure_text(&output.summary, "summary")?;
        if output.key_points.iter().any(|point| point.trim().is_empty()) {
            return Err(anyhow!("model reply has an empty key point"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_and_key_points_are_translatable() {
        let mut summary: DocumentSummary =
            serde_json::from_str(r#"{"summary":"S","keyPoints":["a","b"]}"#).unwrap();
        let mut leaves = Vec::new();
        summary.text_fields(&mut leaves);
        assert_eq!(leaves.len(), 3);
    }

    #[test]
    fn blank_key_points_are_rejected() {
        let summary = DocumentSummary {
            summary: "S".to_string(),
            key_points: vec!["ok".to_string(), "".to_string()],
        };
        assert!(Summarize::check(&summary).is_err());
    }
}
