//! Canonical-language bridge around producer calls.
//!
//! Requests are translated into the canonical working language, the producer
//! runs, and every human-readable leaf of the result is translated back into
//! the caller's language. Leaves are translated concurrently and written back
//! in structural order.
mod shape;

pub use shape::Translatable;

use crate::error::OrchestrationError;
use crate::language::LanguageCode;
use crate::producer::AnswerProducer;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;

/// Text translation service consumed by the bridge.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: &LanguageCode) -> Result<String>;
}

#[derive(Clone)]
pub struct LanguageBridge {
    translator: Arc<dyn Translator>,
    canonical: LanguageCode,
    concurrency: usize,
}

impl LanguageBridge {
    pub fn new(translator: Arc<dyn Translator>, canonical: LanguageCode, concurrency: usize) -> Self {
        Self {
            translator,
            canonical,
            concurrency: concurrency.max(1),
        }
    }

    pub fn canonical(&self) -> &LanguageCode {
        &self.canonical
    }

    /// Translate free text. Identity for the canonical language and for blank text.
    pub async fn translate_text(
        &self,
        text: &str,
        target: &LanguageCode,
    ) -> Result<String, OrchestrationError> {
        if *target == self.canonical {
            return Ok(text.to_string());
        }
        self.translate_leaf(text, target).await
    }

    /// Run `producer` in the canonical language on behalf of a `language` caller.
    ///
    /// Producer failures come back as [`OrchestrationError::Producer`] without
    /// any outbound translation; any leaf translation failure fails the call.
    pub async fn with_translation<P>(
        &self,
        mut request: P::Input,
        language: &LanguageCode,
        producer: &P,
    ) -> Result<P::Output, OrchestrationError>
    where
        P: AnswerProducer + ?Sized,
    {
        let bridged = *language != self.canonical;
        if bridged {
            let leaves = self.translate_in_place(&mut request, &self.canonical).await?;
            tracing::debug!(leaves, from = %language, "request canonicalized");
        }

        let mut output = producer
            .invoke(request)
            .await
            .map_err(|err| OrchestrationError::producer(&err))?;

        if bridged {
            let leaves = self.translate_in_place(&mut output, language).await?;
            tracing::debug!(leaves, to = %language, "result localized");
        }
        Ok(output)
    }

    /// Translate every leaf of `value` into `target`, returning the leaf count.
    pub async fn translate_in_place<T>(
        &self,
        value: &mut T,
        target: &LanguageCode,
    ) -> Result<usize, OrchestrationError>
    where
        T: Translatable + ?Sized,
    {
        let mut slots = Vec::new();
        value.text_fields(&mut slots);

        // `buffered` yields in submission order whatever the completion order.
        let translated: Vec<String> = stream::iter(
            slots
                .iter()
                .map(|slot| self.translate_leaf(slot.as_str(), target)),
        )
        .buffered(self.concurrency)
        .try_collect()
        .await?;

        let count = slots.len();
        for (slot, text) in slots.into_iter().zip(translated) {
            *slot = text;
        }
        Ok(count)
    }

    async fn translate_leaf(
        &self,
        text: &str,
        target: &LanguageCode,
    ) -> Result<String, OrchestrationError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }
        self.translator
            .translate(text, target)
            .await
            .map_err(|err| OrchestrationError::translation(&err))
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
