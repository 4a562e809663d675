//! Uploaded documents and the upload boundary checks.
use anyhow::{anyhow, Context, Result};
use base64::Engine;
use std::fs;
use std::path::Path;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Document payload: already-readable text or an opaque binary blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentContent {
    Text(String),
    Binary { content_type: String, bytes: Vec<u8> },
}

/// A named document owned by a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    name: String,
    content: DocumentContent,
}

impl Document {
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: DocumentContent::Text(text.into()),
        }
    }

    pub fn binary(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content: DocumentContent::Binary {
                content_type: content_type.into(),
                bytes,
            },
        }
    }

    /// Read a file, keeping `text/*` content as text and everything else binary.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = fs::read(path).with_context(|| format!("read document {}", path.display()))?;
        Ok(Self::from_bytes(name, content_type_for_path(path), bytes))
    }

    /// Parse a `data:<mime>;base64,<payload>` URI.
    pub fn from_data_uri(name: impl Into<String>, uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("data URI must start with \"data:\""))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| anyhow!("data URI is missing the ',' separator"))?;
        let content_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| anyhow!("only base64 data URIs are supported"))?;
        let content_type = if content_type.is_empty() {
            TEXT_CONTENT_TYPE
        } else {
            content_type
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .context("decode base64 data URI payload")?;
        Ok(Self::from_bytes(name.into(), content_type, bytes))
    }

    fn from_bytes(name: String, content_type: &str, bytes: Vec<u8>) -> Self {
        if is_text_type(content_type) {
            let text = String::from_utf8_lossy(&bytes).to_string();
            Self::text(name, text)
        } else {
            Self::binary(name, content_type, bytes)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &DocumentContent {
        &self.content
    }

    pub fn content_type(&self) -> &str {
        match &self.content {
            DocumentContent::Text(_) => TEXT_CONTENT_TYPE,
            DocumentContent::Binary { content_type, .. } => content_type,
        }
    }

    /// True when there is nothing to read: blank text or zero bytes.
    pub fn is_empty(&self) -> bool {
        match &self.content {
            DocumentContent::Text(text) => text.trim().is_empty(),
            DocumentContent::Binary { bytes, .. } => bytes.is_empty(),
        }
    }
}

/// Guess a content type from the file extension.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => PDF_CONTENT_TYPE,
        Some("txt" | "text" | "log") => TEXT_CONTENT_TYPE,
        Some("md" | "markdown") => "text/markdown",
        Some("csv") => "text/csv",
        Some("html" | "htm") => "text/html",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

fn is_text_type(content_type: &str) -> bool {
    content_type.starts_with("text/")
}

/// Upload limits enforced before documents reach the orchestration core.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_documents: usize,
    pub allowed_content_types: Vec<String>,
}

impl UploadPolicy {
    pub fn allows(&self, content_type: &str) -> bool {
        let content_type = content_type.trim().to_ascii_lowercase();
        self.allowed_content_types.iter().any(|allowed| {
            let allowed = allowed.trim().to_ascii_lowercase();
            match allowed.strip_suffix("/*") {
                Some(prefix) => content_type
                    .split_once('/')
                    .is_some_and(|(major, _)| major == prefix),
                None => allowed == content_type,
            }
        })
    }

    /// Reject oversized batches and content types outside the allow-list.
    pub fn check(&self, documents: &[Document]) -> Result<()> {
        if documents.len() > self.max_documents {
            return Err(anyhow!(
                "at most {} documents may be uploaded at once (got {})",
                self.max_documents,
                documents.len()
            ));
        }
        for doc in documents {
            if !self.allows(doc.content_type()) {
                return Err(anyhow!(
                    "document {:?} has unsupported content type {}",
                    doc.name(),
                    doc.content_type()
                ));
            }
        }
        Ok(())
    }
}
