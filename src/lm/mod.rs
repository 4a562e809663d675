//! Model-service client, reply parsing and the model-backed translator.
mod client;
mod response;
mod translator;

pub use client::{LmBackend, LmClient};
pub use response::{extract_json, parse_reply};
pub use translator::LmTranslator;
