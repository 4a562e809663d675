//! Worker side of the extraction boundary.
//!
//! Reads the payload from stdin, extracts text, and writes one JSON
//! [`ExtractionResult`] line to stdout. Explicit failures are reported in the
//! JSON with exit code 0; anything worse (allocation abort, signal) shows up
//! to the supervisor as an abnormal exit.
use super::pdf::extract_pdf_text;
use super::ExtractionResult;
use crate::document::PDF_CONTENT_TYPE;
use anyhow::{anyhow, Context, Result};
use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};

/// Entry point for `doclens extract-worker`.
pub fn run_worker_stdio(mime_hint: &str, memory_limit_mb: Option<u64>) -> Result<()> {
    if let Some(limit) = memory_limit_mb {
        apply_memory_limit(limit)?;
    }

    let mut payload = Vec::new();
    std::io::stdin()
        .lock()
        .read_to_end(&mut payload)
        .context("read payload from stdin")?;

    let result = extract_payload(&payload, mime_hint);
    let line = serde_json::to_string(&result).context("serialize extraction result")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").context("write extraction result")?;
    stdout.flush().context("flush stdout")?;
    Ok(())
}

/// Extract text and convert errors and panics into a failed result.
pub fn extract_payload(payload: &[u8], mime_hint: &str) -> ExtractionResult {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| extract_text(payload, mime_hint)));
    match outcome {
        Ok(Ok(text)) => ExtractionResult::ok(text),
        Ok(Err(err)) => ExtractionResult::failed(format!("parsing failed in worker: {err:#}")),
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            ExtractionResult::failed(format!("parser crashed in worker: {detail}"))
        }
    }
}

fn extract_text(payload: &[u8], mime_hint: &str) -> Result<String> {
    let mime = mime_hint
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if mime == PDF_CONTENT_TYPE {
        return extract_pdf_text(payload);
    }
    if mime.starts_with("text/") {
        if payload.is_empty() {
            return Err(anyhow!("document is empty"));
        }
        let text = String::from_utf8_lossy(payload).to_string();
        if text.trim().is_empty() {
            return Err(anyhow!("no extractable text in {} byte(s) of whitespace", payload.len()));
        }
        return Ok(text);
    }
    Err(anyhow!("unsupported content type {mime_hint:?}"))
}

#[cfg(unix)]
fn apply_memory_limit(limit_mb: u64) -> Result<()> {
    let bytes = limit_mb.saturating_mul(1024 * 1024) as libc::rlim_t;
    let limit = libc::rlimit {
        rlim_cur: bytes,
        rlim_max: bytes,
    };
    // SAFETY: setrlimit only reads the struct we pass by reference.
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_AS, &limit) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error()).context("set worker memory limit");
    }
    tracing::debug!(limit_mb, "worker memory limit applied");
    Ok(())
}

#[cfg(not(unix))]
fn apply_memory_limit(limit_mb: u64) -> Result<()> {
    tracing::debug!(limit_mb, "worker memory limit unsupported on this platform");
    Ok(())
}
