use crate::bridge::Translatable;
use async_trait::async_trait;

/// Uniform async contract implemented by every analysis feature.
///
/// Inputs and outputs are [`Translatable`] so the language bridge can move
/// their natural-language leaves in and out of the canonical language.
#[async_trait]
pub trait AnswerProducer: Send + Sync {
    type Input: Translatable + Send + 'static;
    type Output: Translatable + Send + 'static;

    async fn invoke(&self, input: Self::Input) -> anyhow::Result<Self::Output>;
}
