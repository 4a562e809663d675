//! Runtime configuration.
//!
//! Config is JSON, loaded from an explicit path or the user config dir, then
//! overridden from the environment and validated once at startup.
use crate::language::LanguageCode;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current schema version for `config.json`.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Environment variable naming an LM command (prompt on stdin, reply on stdout).
pub const ENV_LM_COMMAND: &str = "DOCLENS_LM_COMMAND";
/// Environment variable naming an OpenAI-compatible chat completions endpoint.
pub const ENV_LM_ENDPOINT: &str = "DOCLENS_LM_ENDPOINT";
/// Model name sent to the HTTP backend.
pub const ENV_LM_MODEL: &str = "DOCLENS_LM_MODEL";
/// Default environment variable holding the HTTP bearer token.
pub const ENV_LM_API_KEY: &str = "DOCLENS_LM_API_KEY";

const DEFAULT_LM_COMMAND: &str = "llm -m gpt-4o-mini";
const DEFAULT_HTTP_MODEL: &str = "gpt-4o-mini";

/// How the model service is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LmBackendConfig {
    /// Shell-words command line; prompt on stdin, reply on stdout.
    Command { command: String },
    /// OpenAI-compatible `/chat/completions` endpoint.
    Http {
        endpoint: String,
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key_env: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,
    /// Working language of every producer call.
    pub canonical_language: LanguageCode,
    pub lm: LmBackendConfig,
    pub model_timeout_secs: u64,
    /// Retries after a malformed model reply. Transport failures are not retried.
    pub lm_max_retries: usize,
    pub extract_timeout_secs: u64,
    pub extract_max_bytes: usize,
    /// Address-space cap applied inside the extraction worker (Unix only).
    pub worker_memory_limit_mb: Option<u64>,
    /// Overrides the worker command line; defaults to `<current exe> extract-worker`.
    pub worker_command: Option<String>,
    pub max_documents: usize,
    /// Exact types or `type/*` wildcards.
    pub allowed_content_types: Vec<String>,
    pub translation_concurrency: usize,
    /// Conversations untouched for this long are dropped from memory.
    pub session_idle_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        default_config()
    }
}

/// Defaults used when no config file is present.
pub fn default_config() -> Config {
    Config {
        schema_version: CONFIG_SCHEMA_VERSION,
        canonical_language: LanguageCode::canonical(),
        lm: LmBackendConfig::Command {
            command: DEFAULT_LM_COMMAND.to_string(),
        },
        model_timeout_secs: 120,
        lm_max_retries: 2,
        extract_timeout_secs: 30,
        extract_max_bytes: 20 * 1024 * 1024,
        worker_memory_limit_mb: Some(1024),
        worker_command: None,
        max_documents: 5,
        allowed_content_types: vec!["text/*".to_string(), "application/pdf".to_string()],
        translation_concurrency: 8,
        session_idle_secs: 60 * 60,
    }
}

/// Render a pretty JSON config stub.
pub fn config_stub() -> Result<String> {
    serde_json::to_string_pretty(&default_config()).context("serialize config stub")
}

/// `<config dir>/doclens/config.json`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("doclens").join("config.json"))
}

/// Load, override from the process environment, and validate.
///
/// An explicit path must exist; the default path is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = match explicit {
        Some(path) => read_config(path)?,
        None => match default_config_path().filter(|path| path.is_file()) {
            Some(path) => read_config(&path)?,
            None => default_config(),
        },
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

pub fn read_config(path: &Path) -> Result<Config> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse config {}", path.display()))
}

/// Apply `DOCLENS_*` overrides. A command override wins over an endpoint.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    if let Some(command) = non_empty(ENV_LM_COMMAND) {
        config.lm = LmBackendConfig::Command { command };
        return;
    }
    if let Some(endpoint) = non_empty(ENV_LM_ENDPOINT) {
        let model = non_empty(ENV_LM_MODEL).unwrap_or_else(|| DEFAULT_HTTP_MODEL.to_string());
        config.lm = LmBackendConfig::Http {
            endpoint,
            model,
            api_key_env: Some(ENV_LM_API_KEY.to_string()),
        };
    } else if let (Some(model), LmBackendConfig::Http { model: current, .. }) =
        (non_empty(ENV_LM_MODEL), &mut config.lm)
    {
        *current = model;
    }
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    match &config.lm {
        LmBackendConfig::Command { command } => {
            if command.trim().is_empty() {
                return Err(anyhow!("lm.command must be non-empty"));
            }
            shell_words::split(command)
                .with_context(|| format!("parse lm.command {command:?}"))?;
        }
        LmBackendConfig::Http {
            endpoint, model, ..
        } => {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(anyhow!("lm.endpoint must be an http(s) URL (got {endpoint:?})"));
            }
            if model.trim().is_empty() {
                return Err(anyhow!("lm.model must be non-empty"));
            }
        }
    }
    if config.model_timeout_secs == 0 {
        return Err(anyhow!("model_timeout_secs must be > 0"));
    }
    if config.extract_timeout_secs == 0 {
        return Err(anyhow!("extract_timeout_secs must be > 0"));
    }
    if config.extract_max_bytes == 0 {
        return Err(anyhow!("extract_max_bytes must be > 0"));
    }
    if config.worker_memory_limit_mb == Some(0) {
        return Err(anyhow!("worker_memory_limit_mb must be > 0 when set"));
    }
    if let Some(command) = config.worker_command.as_deref() {
        let args = shell_words::split(command)
            .with_context(|| format!("parse worker_command {command:?}"))?;
        if args.is_empty() {
            return Err(anyhow!("worker_command must be non-empty when set"));
        }
    }
    if config.max_documents == 0 {
        return Err(anyhow!("max_documents must be > 0"));
    }
    if config.translation_concurrency == 0 {
        return Err(anyhow!("translation_concurrency must be > 0"));
    }
    if config.session_idle_secs == 0 {
        return Err(anyhow!("session_idle_secs must be > 0"));
    }
    if config.allowed_content_types.is_empty() {
        return Err(anyhow!("allowed_content_types must list at least one type"));
    }
    for entry in &config.allowed_content_types {
        if !entry.contains('/') {
            return Err(anyhow!(
                "allowed_content_types entries must look like type/subtype (got {entry:?})"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
