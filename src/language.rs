//! Display-language catalogue and the canonical working language.
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Language every answer producer operates in.
pub const CANONICAL_LANGUAGE: &str = "en";

/// ISO 639-1 style language code (lowercase, 2-3 ASCII letters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn parse(raw: &str) -> Result<Self> {
        let code = raw.trim().to_ascii_lowercase();
        let valid = (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_lowercase());
        if !valid {
            return Err(anyhow!("invalid language code {raw:?}"));
        }
        Ok(Self(code))
    }

    pub fn canonical() -> Self {
        Self(CANONICAL_LANGUAGE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Native label from the catalogue, if the code is supported.
    pub fn label(&self) -> Option<&'static str> {
        SUPPORTED_LANGUAGES
            .iter()
            .find(|lang| lang.code == self.0)
            .map(|lang| lang.label)
    }

    pub fn is_supported(&self) -> bool {
        self.label().is_some()
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<LanguageCode> for String {
    fn from(value: LanguageCode) -> Self {
        value.0
    }
}

/// A selectable display language.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LanguageOption {
    pub code: &'static str,
    pub label: &'static str,
}

const fn lang(code: &'static str, label: &'static str) -> LanguageOption {
    LanguageOption { code, label }
}

/// Display languages offered to users.
pub const SUPPORTED_LANGUAGES: &[LanguageOption] = &[
    lang("en", "English"),
    lang("ar", "العربية"),
    lang("bn", "বাংলা"),
    lang("zh", "中文"),
    lang("fr", "Français"),
    lang("de", "Deutsch"),
    lang("he", "עברית"),
    lang("hi", "हिन्दी"),
    lang("it", "Italiano"),
    lang("ja", "日本語"),
    lang("ko", "한국어"),
    lang("pt", "Português"),
    lang("ru", "Русский"),
    lang("es", "Español"),
    lang("sv", "Svenska"),
    lang("as", "অসমীয়া"),
    lang("gu", "ગુજરાતી"),
    lang("kn", "ಕನ್ನಡ"),
    lang("ks", "कश्मीरी"),
    lang("ml", "മലയാളം"),
    lang("mr", "मराठी"),
    lang("ne", "नेपाली"),
    lang("or", "ଓଡ଼ିଆ"),
    lang("pa", "ਪੰਜਾਬੀ"),
    lang("sa", "संस्कृतम्"),
    lang("sd", "سنڌي"),
    lang("ta", "தமிழ்"),
    lang("te", "తెలుగు"),
    lang("ur", "اردو"),
];
