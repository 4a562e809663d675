use super::{ensure_text, PromptFeature, SourceText};
use crate::bridge::Translatable;
use crate::util::fill_template;
use anyhow::Result;
use serde::{Deserialize, Serialize};

const RISK_TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/risk.md"));

#[derive(Debug, Clone, PartialEq)]
pub struct RiskRequest {
    pub policy: SourceText,
}

impl Translatable for RiskRequest {
    fn text_fields<'a>(&'a mut self, _out: &mut Vec<&'a mut String>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskItem {
    pub risk_level: RiskLevel,
    pub risk_area: String,
    pub description: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    pub overall_risk_assessment: String,
    #[serde(default)]
    pub risk_report: Vec<RiskItem>,
}

impl RiskReport {
    /// Highest level among reported risks.
    pub fn max_level(&self) -> Option<RiskLevel> {
        self.risk_report.iter().map(|item| item.risk_level).max()
    }
}

impl Translatable for RiskItem {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        self.risk_area.text_fields(out);
        self.description.text_fields(out);
        self.suggestion.text_fields(out);
    }
}

impl Translatable for RiskReport {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        self.overall_risk_assessment.text_fields(out);
        self.risk_report.text_fields(out);
    }
}

pub struct DetectRisks;

impl PromptFeature for DetectRisks {
    const NAME: &'static str = "risk";
    type Input = RiskRequest;
    type Output = RiskReport;

    fn render(input: &RiskRequest) -> String {
        fill_template(RISK_TEMPLATE, &[("policy", input.policy.text.as_str())])
    }

    fn check(output: &RiskReport) -> Result<()> {
        ensure_text(&output.overall_risk_assessment, "overallRiskAssessment")
    }
}
