use super::{ensure_text, PromptFeature, SourceText};
use crate::bridge::Translatable;
use crate::util::fill_template;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

const COMPLIANCE_TEMPLATE: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/compliance.md"));

#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceRequest {
    pub policy: SourceText,
    /// Standard to check against, e.g. "GDPR".
    pub standard: String,
}

impl Translatable for ComplianceRequest {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        self.standard.text_fields(out);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceItem {
    pub is_compliant: bool,
    pub clause: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub overall_compliance: String,
    /// 0 to 100, where 100 is fully compliant.
    pub compliance_score: f64,
    #[serde(default)]
    pub compliance_report: Vec<ComplianceItem>,
}

impl Translatable for ComplianceItem {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        self.clause.text_fields(out);
        self.reason.text_fields(out);
    }
}

impl Translatable for ComplianceReport {
    fn text_fields<'a>(&'a mut self, out: &mut Vec<&'a mut String>) {
        self.overall_compliance.text_fields(out);
        self.compliance_report.text_fields(out);
    }
}

pub struct CheckCompliance;

impl PromptFeature for CheckCompliance {
    const NAME: &'static str = "compliance";
    type Input = ComplianceRequest;
    type Output = ComplianceReport;

    fn render(input: &ComplianceRequest) -> String {
        fill_template(
            COMPLIANCE_TEMPLATE,
            &[
                ("standard", input.standard.as_str()),
                ("policy", input.policy.text.as_str()),
            ],
        )
    }

    fn check(output: &ComplianceReport) -> Result<()> {
        ensure_text(&output.overall_compliance, "overallCompliance")?;
        if !(0.0..=100.0).contains(&output.compliance_score) {
            return Err(anyhow!(
                "complianceScore must be between 0 and 100 (got {})",
                output.compliance_score
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"{
        "overallCompliance": "Partially compliant",
        "complianceScore": 62,
        "complianceReport": [
            {"isCompliant": true, "clause": "Data is encrypted at rest.", "reason": "Meets Art. 32."},
            {"isCompliant": false, "clause": "Logs kept forever.", "reason": "No retention limit."}
        ]
    }"#;

    #[test]
    fn reply_parses_and_passes_check() {
        let report: ComplianceReport = serde_json::from_str(REPLY).unwrap();
        assert!(CheckCompliance::check(&report).is_ok());
        assert!(!report.compliance_report[1].is_compliant);
    }

    #[test]
    fn flags_and_scores_are_not_translated() {
        let mut report: ComplianceReport = serde_json::from_str(REPLY).unwrap();
        let mut leaves = Vec::new();
        report.text_fields(&mut leaves);
        assert_eq!(leaves.len(), 5);
    }

    #[test]
    fn out_of_range_score_is_rejected() {
        let mut report: ComplianceReport = serde_json::from_str(REPLY).unwrap();
        report.compliance_score = 140.0;
        assert!(CheckCompliance::check(&report).is_err());
    }

    #[test]
    fn prompt_names_the_standard() {
        let prompt = CheckCompliance::render(&ComplianceRequest {
            policy: SourceText::new("p.txt", "We keep logs."),
            standard: "HIPAA".to_string(),
        });
        assert!(prompt.contains("\"HIPAA\""));
        assert!(prompt.contains("We keep logs."));
    }
}
