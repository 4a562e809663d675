//! Analysis features: typed requests and results plus their prompts.
//!
//! Each feature is a [`PromptFeature`] marker type; [`LmProducer`] turns any of
//! them into an [`AnswerProducer`] backed by the model client.
pub mod ask;
pub mod compliance;
pub mod improve;
pub mod query;
pub mod risk;
pub mod summary;

use crate::bridge::Translatable;
use crate::lm::LmClient;
use crate::producer::AnswerProducer;
use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Write as _;
use std::marker::PhantomData;

/// A document already resolved to plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceText {
    pub name: String,
    pub text: String,
}

impl SourceText {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Prompt, request and result types of one model-backed feature.
pub trait PromptFeature: Send + Sync + 'static {
    /// Task name used in logs and retry errors.
    const NAME: &'static str;

    type Input: Translatable + Send + Sync + 'static;
    type Output: Translatable + DeserializeOwned + Send + 'static;

    fn render(input: &Self::Input) -> String;

    /// Reject well-formed but unusable replies; a rejection triggers a retry.
    fn check(_output: &Self::Output) -> Result<()> {
        Ok(())
    }
}

/// [`AnswerProducer`] that renders a feature prompt and parses the model reply.
pub struct LmProducer<F> {
    client: LmClient,
    _feature: PhantomData<fn() -> F>,
}

impl<F> LmProducer<F> {
    pub fn new(client: LmClient) -> Self {
        Self {
            client,
            _feature: PhantomData,
        }
    }
}

#[async_trait]
impl<F: PromptFeature> AnswerProducer for LmProducer<F> {
    type Input = F::Input;
    type Output = F::Output;

    async fn invoke(&self, input: F::Input) -> Result<F::Output> {
        let prompt = F::render(&input);
        self.client
            .generate_checked(F::NAME, &prompt, F::check)
            .await
    }
}

fn ensure_text(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow::anyhow!("model reply has an empty {field}"));
    }
    Ok(())
}

fn render_documents(documents: &[SourceText]) -> String {
    let mut out = String::new();
    for doc in documents {
        let _ = writeln!(out, "### {}\n\n{}\n", doc.name, doc.text.trim_end());
    }
    out
}

fn render_list(items: &[String]) -> String {
    let mut out = String::new();
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
    out
}
