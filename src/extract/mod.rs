//! Text extraction from untrusted binary documents.
//!
//! Parsing happens in a separate worker process (`doclens extract-worker`).
//! The parent writes the payload to the worker's stdin and reads exactly one
//! JSON [`ExtractionResult`] from its stdout. Crashes, abnormal exits, garbage
//! output and timeouts all come back as `success = false`; nothing the worker
//! does can take the host process down.
//!
//! # Protocol
//!
//! ```text
//! parent                               worker
//!   | spawn (env DOCLENS_MIME_HINT)      |
//!   | -- payload bytes on stdin, EOF --> |
//!   |                                    | parse (memory capped)
//!   | <-- {"success":..} on stdout ----- |
//!   | wait / kill on timeout             | exit
//! ```
mod pdf;
mod supervisor;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use pdf::{paginate, PAGE_MARKER_PREFIX};
pub use supervisor::{IsolatedExtractor, WorkerCommand};

/// Environment variable carrying the content-type hint to the worker.
pub const ENV_MIME_HINT: &str = "DOCLENS_MIME_HINT";
/// Environment variable carrying the worker's address-space cap in MiB.
pub const ENV_MEMORY_LIMIT_MB: &str = "DOCLENS_WORKER_MEMORY_MB";

/// Wire contract returned across the isolation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: Some(text.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            text: None,
            error: Some(error.into()),
        }
    }

    /// Normalize a result read off the wire: inconsistent shapes and blank
    /// text become failures.
    pub fn normalized(self) -> Self {
        match self {
            Self {
                success: true,
                text: Some(text),
                ..
            } if text.trim().is_empty() => Self::failed("extraction produced no text"),
            Self {
                success: true,
                text: Some(text),
                ..
            } => Self::ok(text),
            Self { success: true, .. } => Self::failed("extraction worker reported success without text"),
            Self {
                error: Some(error), ..
            } if !error.trim().is_empty() => Self::failed(error),
            _ => Self::failed("extraction worker reported failure without a message"),
        }
    }

    pub fn into_result(self) -> Result<String, String> {
        match self.normalized() {
            Self {
                text: Some(text), ..
            } => Ok(text),
            Self { error, .. } => Err(error.unwrap_or_default()),
        }
    }
}
