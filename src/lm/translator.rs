use super::LmClient;
use crate::bridge::Translator;
use crate::language::LanguageCode;
use crate::util::fill_template;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

const TRANSLATE_TEMPLATE: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/translate.md"));

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslatedText {
    translated_text: String,
}

/// Translator backed by the configured model service.
#[derive(Debug, Clone)]
pub struct LmTranslator {
    client: LmClient,
}

impl LmTranslator {
    pub fn new(client: LmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Translator for LmTranslator {
    async fn translate(&self, text: &str, target: &LanguageCode) -> Result<String> {
        let prompt = render_prompt(text, target);
        let reply: TranslatedText = self.client.generate("translate", &prompt).await?;
        if reply.translated_text.trim().is_empty() {
            return Err(anyhow!("model returned an empty translation"));
        }
        Ok(reply.translated_text)
    }
}

fn render_prompt(text: &str, target: &LanguageCode) -> String {
    let label = target.label().unwrap_or(target.as_str());
    fill_template(
        TRANSLATE_TEMPLATE,
        &[
            ("language", target.as_str()),
            ("language_label", label),
            ("text", text),
        ],
    )
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::lm::LmBackend;
    use std::time::Duration;

    fn translator(script: &str) -> LmTranslator {
        LmTranslator::new(LmClient::new(
            LmBackend::Command {
                argv: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            },
            Duration::from_secs(10),
            0,
        ))
    }

    #[test]
    fn prompt_names_target_language() {
        let prompt = render_prompt("Hello {text}", &LanguageCode::parse("es").unwrap());
        assert!(prompt.contains("(language code \"es\")"));
        assert!(prompt.contains("Hello {text}"));
    }

    #[tokio::test]
    async fn reply_text_is_returned() {
        let translator = translator(r#"cat >/dev/null; echo '{"translatedText":"Hola"}'"#);
        let out = translator
            .translate("Hello", &LanguageCode::parse("es").unwrap())
            .await
            .unwrap();
        assert_eq!(out, "Hola");
    }

    #[tokio::test]
    async fn empty_translation_is_an_error() {
        let translator = translator(r#"cat >/dev/null; echo '{"translatedText":" "}'"#);
        let err = translator
            .translate("Hello", &LanguageCode::parse("es").unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty translation"));
    }
}
