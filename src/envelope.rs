//! Uniform `{ data, error }` response shape returned by every entry point.
use serde::{Deserialize, Serialize};

/// Result-or-error wrapper crossing the user-facing boundary.
///
/// Fields are private: the only constructors are [`AnswerEnvelope::ok`] and
/// [`AnswerEnvelope::err`], so exactly one side is ever populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEnvelope<T> {
    data: Option<T>,
    error: Option<String>,
}

impl<T> AnswerEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    /// Build a failed envelope. Blank messages are replaced so the error side
    /// is never empty.
    pub fn err(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "An unknown error occurred.".to_string()
        } else {
            message
        };
        Self {
            data: None,
            error: Some(message),
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_ok(&self) -> bool {
        self.data.is_some()
    }

    pub fn into_result(self) -> Result<T, String> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err("An unknown error occurred.".to_string()),
        }
    }
}
