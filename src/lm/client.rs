//! Model-service invocation: an external command or an OpenAI-compatible HTTP endpoint.
use super::response::parse_reply;
use crate::config::{Config, LmBackendConfig};
use crate::util::{fill_template, snippet, truncate_bytes};
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const RETRY_TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/retry.md"));

/// Resolved backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LmBackend {
    Command {
        argv: Vec<String>,
    },
    Http {
        endpoint: String,
        model: String,
        api_key: Option<String>,
    },
}

impl LmBackend {
    pub fn from_config(config: &LmBackendConfig) -> Result<Self> {
        match config {
            LmBackendConfig::Command { command } => {
                let argv = shell_words::split(command)
                    .with_context(|| format!("parse LM command: {command}"))?;
                if argv.is_empty() {
                    return Err(anyhow!("LM command is empty"));
                }
                Ok(Self::Command { argv })
            }
            LmBackendConfig::Http {
                endpoint,
                model,
                api_key_env,
            } => Ok(Self::Http {
                endpoint: endpoint.clone(),
                model: model.clone(),
                api_key: api_key_env
                    .as_deref()
                    .and_then(|key| std::env::var(key).ok())
                    .filter(|value| !value.trim().is_empty()),
            }),
        }
    }
}

/// Client shared by every model-backed producer and the translator.
#[derive(Debug, Clone)]
pub struct LmClient {
    backend: LmBackend,
    timeout: Duration,
    max_retries: usize,
}

impl LmClient {
    pub fn new(backend: LmBackend, timeout: Duration, max_retries: usize) -> Self {
        Self {
            backend,
            timeout,
            max_retries,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            LmBackend::from_config(&config.lm)?,
            Duration::from_secs(config.model_timeout_secs),
            config.lm_max_retries,
        ))
    }

    /// Send one prompt and return the raw reply text.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let response = match &self.backend {
            LmBackend::Command { argv } => invoke_command(argv, prompt, self.timeout).await?,
            LmBackend::Http {
                endpoint,
                model,
                api_key,
            } => {
                let request = ChatCall {
                    endpoint: endpoint.clone(),
                    model: model.clone(),
                    api_key: api_key.clone(),
                    prompt: prompt.to_string(),
                    timeout: self.timeout,
                };
                tokio::task::spawn_blocking(move || request.send())
                    .await
                    .context("join LM request task")??
            }
        };
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis(),
            prompt_bytes = prompt.len(),
            response_bytes = response.len(),
            "lm invoke complete"
        );
        Ok(response)
    }

    /// Send a prompt and deserialize the JSON reply.
    ///
    /// A malformed reply is retried with the parse error folded into the
    /// prompt. Transport errors are returned immediately.
    pub async fn generate<T: DeserializeOwned>(&self, task: &str, prompt: &str) -> Result<T> {
        self.generate_checked(task, prompt, |_| Ok(())).await
    }

    /// Like [`generate`](Self::generate), also retrying when `check` rejects
    /// an otherwise well-formed reply.
    pub async fn generate_checked<T, C>(&self, task: &str, prompt: &str, check: C) -> Result<T>
    where
        T: DeserializeOwned,
        C: Fn(&T) -> Result<()>,
    {
        let mut last_error: Option<String> = None;
        let mut last_response: Option<String> = None;

        for attempt in 0..=self.max_retries {
            let request = if attempt == 0 {
                prompt.to_string()
            } else {
                tracing::warn!(task, attempt, max = self.max_retries, "lm retry");
                build_retry_prompt(
                    prompt,
                    last_error.as_deref().unwrap_or("unknown error"),
                    last_response.as_deref(),
                )
            };

            let response = self.complete(&request).await?;
            match parse_reply::<T>(&response).and_then(|value| check(&value).map(|()| value)) {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(task, attempt, "lm retry succeeded");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    last_error = Some(err.to_string());
                    last_response = Some(response);
                }
            }
        }

        Err(anyhow!(
            "model reply for {task} was unusable after {} attempts: {}",
            self.max_retries + 1,
            last_error.unwrap_or_else(|| "unknown".to_string())
        ))
    }
}

fn build_retry_prompt(prompt: &str, error: &str, previous_response: Option<&str>) -> String {
    let previous = previous_response
        .map(|resp| snippet(resp, 1000))
        .unwrap_or_default();
    fill_template(
        RETRY_TEMPLATE,
        &[
            ("error", error),
            ("previous_response", previous.as_str()),
            ("original_prompt", prompt),
        ],
    )
}

async fn invoke_command(argv: &[String], prompt: &str, timeout: Duration) -> Result<String> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("LM command is empty"))?;
    let resolved =
        which::which(program).with_context(|| format!("locate LM command {program:?}"))?;

    let mut child = Command::new(&resolved)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawn LM command: {program}"))?;

    let stdin = child.stdin.take();
    let exchange = async move {
        let feed = async {
            if let Some(mut stdin) = stdin {
                stdin.write_all(prompt.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };
        tokio::join!(feed, child.wait_with_output())
    };

    let (fed, output) = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| anyhow!("LM command timed out after {}s", timeout.as_secs_f64()))?;
    let output = output.context("wait for LM command")?;

    if !output.status.success() {
        return Err(anyhow!(
            "LM command failed with status {}: {}",
            output.status,
            truncate_bytes(&output.stderr, 2048).trim()
        ));
    }
    fed.context("write prompt to LM stdin")?;

    String::from_utf8(output.stdout).context("decode LM stdout as UTF-8")
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

struct ChatCall {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    prompt: String,
    timeout: Duration,
}

impl ChatCall {
    fn send(self) -> Result<String> {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build()
            .into();
        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &self.prompt,
            }],
        };

        let mut request = agent.post(&url);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        let mut response = request
            .send_json(&body)
            .with_context(|| format!("POST {url}"))?;
        let reply: ChatResponse = response
            .body_mut()
            .read_json()
            .context("decode chat completion response")?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("chat completion response had no content"))
    }
}
