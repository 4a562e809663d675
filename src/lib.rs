//! Document intelligence orchestration.
//!
//! Extracts text from untrusted documents in an isolated worker process,
//! bridges user languages to a single canonical working language around every
//! model call, and keeps ordered multi-turn conversation history for document
//! question answering. [`facade::Orchestrator`] is the entry point.
pub mod bridge;
pub mod config;
pub mod conversation;
pub mod document;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod facade;
pub mod features;
pub mod language;
pub mod lm;
pub mod producer;
pub mod util;

pub use envelope::AnswerEnvelope;
pub use error::OrchestrationError;
pub use facade::Orchestrator;
