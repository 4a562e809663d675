//! Failure taxonomy for the orchestration layer.
//!
//! Lower layers report `anyhow` errors with context; the bridge and the facade
//! classify them here so every entry point can normalize them into an
//! [`AnswerEnvelope`](crate::envelope::AnswerEnvelope).

/// Errors surfaced by orchestration entry points.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// A required input was missing or empty. Raised before any external call.
    #[error("{0}")]
    Validation(String),

    /// Binary parsing failed or the extraction worker exited abnormally.
    #[error("document extraction failed: {0}")]
    Extraction(String),

    /// The answer producer (model service) failed or returned nothing usable.
    #[error("{0}")]
    Producer(String),

    /// The translator failed during inbound or outbound bridging.
    #[error("translation failed: {0}")]
    Translation(String),

    /// Anything else, including panics caught at the facade boundary.
    #[error("{0}")]
    Unexpected(String),
}

impl OrchestrationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Flatten an `anyhow` chain into a single producer failure message.
    pub fn producer(err: &anyhow::Error) -> Self {
        Self::Producer(format!("{err:#}"))
    }

    pub fn translation(err: &anyhow::Error) -> Self {
        Self::Translation(format!("{err:#}"))
    }

    /// Short machine-readable label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Extraction(_) => "extraction",
            Self::Producer(_) => "producer",
            Self::Translation(_) => "translation",
            Self::Unexpected(_) => "unexpected",
        }
    }
}
