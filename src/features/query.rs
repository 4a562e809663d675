//! Per-query answers against a policy document.
use super::{ensure_text, render_list, PromptFeature, SourceText};
use crate::bridge::Translatable;
use crate::util::fill_template;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

const QUERY_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/query_summary.md"
));

/// Clause classes the model is asked to reason with.
pub const DEFAULT_CLAUSE_CLASSIFICATIONS: &str = "Coverage, Exclusion, Limit, Definition, Service";

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub policy: SourceText,
    pub queries: Vec<String>,
    pub clause_classifications: String,
}

impl QueryRequest {
    pub fn new(policy: SourceText, queries: Vec<String>) -> Self {
        Self {
            policy,
            queries,
            clause_classifications: DEFAULT_CLAUSE_CLASSIFICATIONS.to_string(),
        }
    }
}

impl Translatable for QueryRequest {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        self.queries.text_fields(out);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnswer {
    pub question: String,
    pub summary: String,
    #[serde(default)]
    pub relevant_clauses: Vec<String>,
    /// Between 0 and 1.
    pub confidence_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySummary {
    pub answers: Vec<QueryAnswer>,
}

impl Translatable for QueryAnswer {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        self.question.text_fields(out);
        self.summary.text_fields(out);
        self.relevant_clauses.text_fields(out);
    }
}

impl Translatable for QuerySummary {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        self.answers.text_fields(out);
    }
}

pub struct SummarizeQueries;

impl PromptFeature for SummarizeQueries {
    const NAME: &'static str = "query_summary";
    type Input = QueryRequest;
    type Output = QuerySummary;

    fn render(input: &QueryRequest) -> String {
        let queries = render_list(&input.queries);
        fill_template(
            QUERY_TEMPLATE,
            &[
                ("clause_classifications", input.clause_classifications.as_str()),
                ("policy", input.policy.text.as_str()),
                ("queries", queries.as_str()),
            ],
        )
    }

    fn check(output: &QuerySummary) -> Result<()> {
        if output.answers.is_empty() {
            return Err(anyhow!("model reply has no answers"));
        }
        for answer in &output.answers {
            ensure_text(&answer.summary, "summary")?;
            if !(0.0..=1.0).contains(&answer.confidence_score) {
                return Err(anyhow!(
                    "confidenceScore must be between 0 and 1 (got {})",
                    answer.confidence_score
                ));
            }
        }
        Ok(())
    }
}
