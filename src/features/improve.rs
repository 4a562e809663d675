use super::{ensure_text, PromptFeature, SourceText};
use crate::bridge::Translatable;
use crate::util::fill_template;
use anyhow::Result;
use serde::{Deserialize, Serialize};

const IMPROVE_TEMPLATE: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/improve.md"));

#[derive(Debug, Clone, PartialEq)]
pub struct ImproveRequest {
    pub policy: SourceText,
}

impl Translatable for ImproveRequest {
    fn text_fields<'a>(&'a mut self, _out: &mut Vec<&'a mut String>) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub title: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementReport {
    pub summary: String,
    #[serde(default)]
    pub improvements: Vec<Improvement>,
}

impl Translatable for Improvement {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        self.title.text_fields(out);
        self.details.text_fields(out);
    }
}

impl Translatable for ImprovementReport {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        self.summary.text_fields(out);
        self.improvements.text_fields(out);
    }
}

pub struct SuggestImprovements;

impl PromptFeature for SuggestImprovements {
    const NAME: &'static str = "improve";
    type Input = ImproveRequest;
    type Output = ImprovementReport;

    fn render(input: &ImproveRequest) -> String {
        fill_template(IMPROVE_TEMPLATE, &[("policy", input.policy.text.as_str())])
    }

    fn check(output: &ImprovementReport) -> Result<()> {
        ensure_text(&output.summary, "summary")?;
        for item in &output.improvements {
            ensure_text(&item.title, "improvement title")?;
        }
        Ok(())
    }
}
