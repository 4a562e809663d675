//! Orchestration entry points.
//!
//! Every entry point validates its inputs, resolves documents to text,
//! delegates to the language bridge and returns an [`AnswerEnvelope`]. Errors
//! and panics never escape: they are normalized into the envelope's error side
//! as `"<feature prefix>: <message>"`. Validation messages are returned as-is.
use crate::bridge::{LanguageBridge, Translator};
use crate::config::Config;
use crate::conversation::{Conversation, ConversationTurn, ModelReply, SessionStore};
use crate::document::{Document, DocumentContent, UploadPolicy};
use crate::envelope::AnswerEnvelope;
use crate::error::OrchestrationError;
use crate::extract::IsolatedExtractor;
use crate::features::ask::{Ask, AskAnswer, AskRequest, HistoryEntry};
use crate::features::compliance::{CheckCompliance, ComplianceReport, ComplianceRequest};
use crate::features::improve::{ImproveRequest, ImprovementReport, SuggestImprovements};
use crate::features::query::{QueryRequest, QuerySummary, SummarizeQueries};
use crate::features::risk::{DetectRisks, RiskReport, RiskRequest};
use crate::features::summary::{DocumentSummary, Summarize, SummaryRequest};
use crate::features::{LmProducer, SourceText};
use crate::language::LanguageCode;
use crate::lm::{LmClient, LmTranslator};
use crate::producer::AnswerProducer;
use anyhow::Result;
use futures::future::try_join_all;
use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const ASK_FAILURE: &str = "Failed to get answer from document";
pub const SUMMARY_FAILURE: &str = "Failed to summarize document";
pub const QUERY_FAILURE: &str = "Failed to generate summary";
pub const COMPLIANCE_FAILURE: &str = "Failed to check compliance";
pub const RISK_FAILURE: &str = "Failed to detect risks";
pub const IMPROVE_FAILURE: &str = "Failed to suggest improvements";
pub const TRANSLATE_FAILURE: &str = "Failed to translate text";
pub const EXTRACT_FAILURE: &str = "Failed to extract document";

type Producer<I, O> = Arc<dyn AnswerProducer<Input = I, Output = O>>;

/// One producer per model-backed feature.
#[derive(Clone)]
pub struct Producers {
    pub ask: Producer<AskRequest, AskAnswer>,
    pub summary: Producer<SummaryRequest, DocumentSummary>,
    pub query: Producer<QueryRequest, QuerySummary>,
    pub compliance: Producer<ComplianceRequest, ComplianceReport>,
    pub risk: Producer<RiskRequest, RiskReport>,
    pub improve: Producer<ImproveRequest, ImprovementReport>,
}

impl Producers {
    pub fn from_client(client: &LmClient) -> Self {
        Self {
            ask: Arc::new(LmProducer::<Ask>::new(client.clone())),
            summary: Arc::new(LmProducer::<Summarize>::new(client.clone())),
            query: Arc::new(LmProducer::<SummarizeQueries>::new(client.clone())),
            compliance: Arc::new(LmProducer::<CheckCompliance>::new(client.clone())),
            risk: Arc::new(LmProducer::<DetectRisks>::new(client.clone())),
            improve: Arc::new(LmProducer::<SuggestImprovements>::new(client.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedText {
    pub translated_text: String,
}

pub struct Orchestrator {
    extractor: IsolatedExtractor,
    bridge: LanguageBridge,
    producers: Producers,
    sessions: SessionStore,
    upload_policy: UploadPolicy,
}

impl Orchestrator {
    pub fn new(
        extractor: IsolatedExtractor,
        bridge: LanguageBridge,
        producers: Producers,
        upload_policy: UploadPolicy,
    ) -> Self {
        Self {
            extractor,
            bridge,
            producers,
            sessions: SessionStore::new(),
            upload_policy,
        }
    }

    /// Wire the model client, translator and extractor described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = LmClient::from_config(config)?;
        let translator: Arc<dyn Translator> = Arc::new(LmTranslator::new(client.clone()));
        let bridge = LanguageBridge::new(
            translator,
            config.canonical_language.clone(),
            config.translation_concurrency,
        );
        Ok(Self::new(
            IsolatedExtractor::from_config(config)?,
            bridge,
            Producers::from_client(&client),
            UploadPolicy {
                max_documents: config.max_documents,
                allowed_content_types: config.allowed_content_types.clone(),
            },
        )
        .with_session_idle_timeout(Duration::from_secs(config.session_idle_secs)))
    }

    /// Replace the session store with one that evicts sessions idle longer
    /// than `idle_timeout`.
    pub fn with_session_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.sessions = SessionStore::with_idle_timeout(idle_timeout);
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Committed turns of a session; empty for unknown sessions.
    pub fn session_turns(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.sessions
            .get(session_id)
            .map(|conversation| conversation.turns())
            .unwrap_or_default()
    }

    /// Answer `question` about `documents` within a multi-turn session.
    pub async fn ask_document(
        &self,
        session_id: &str,
        documents: &[Document],
        question: &str,
        language: &str,
    ) -> AnswerEnvelope<AskAnswer> {
        self.run("ask", ASK_FAILURE, async {
            if documents.is_empty() || question.trim().is_empty() {
                return Err(OrchestrationError::validation(
                    "At least one document and a question are required.",
                ));
            }
            if session_id.trim().is_empty() {
                return Err(OrchestrationError::validation("A session id is required."));
            }
            let language = parse_language(language)?;
            let sources = self.resolve_documents(documents).await?;
            let conversation = self.sessions.get_or_create(session_id);
            self.ask_in(&conversation, sources, question, &language)
                .await
        })
        .await
    }

    async fn ask_in(
        &self,
        conversation: &Conversation,
        sources: Vec<SourceText>,
        question: &str,
        language: &LanguageCode,
    ) -> Result<AskAnswer, OrchestrationError> {
        let names: Vec<String> = sources.iter().map(|source| source.name.clone()).collect();
        let turn = conversation
            .ask(question.to_string(), |history, question| {
                let request = AskRequest {
                    documents: sources,
                    history: history.iter().map(HistoryEntry::from).collect(),
                    question,
                };
                async move {
                    let answer = self
                        .bridge
                        .with_translation(request, language, self.producers.ask.as_ref())
                        .await?;
                    let source_document = answer
                        .source_document
                        .filter(|name| names.iter().any(|known| known == name));
                    Ok::<_, OrchestrationError>(ModelReply {
                        text: answer.answer,
                        source_document,
                    })
                }
            })
            .await?;
        Ok(AskAnswer {
            answer: turn.text().to_string(),
            source_document: turn.source_document().map(str::to_string),
        })
    }

    pub async fn summarize_document(
        &self,
        document: &Document,
        language: &str,
    ) -> AnswerEnvelope<DocumentSummary> {
        self.run("summarize", SUMMARY_FAILURE, async {
            require_document(document, "Document content is required.")?;
            let language = parse_language(language)?;
            let document = self.resolve_one(document).await?;
            self.bridge
                .with_translation(
                    SummaryRequest { document },
                    &language,
                    self.producers.summary.as_ref(),
                )
                .await
        })
        .await
    }

    pub async fn summarize_queries(
        &self,
        policy: &Document,
        queries: &[String],
        language: &str,
    ) -> AnswerEnvelope<QuerySummary> {
        self.run("query", QUERY_FAILURE, async {
            let queries: Vec<String> = queries
                .iter()
                .map(|query| query.trim())
                .filter(|query| !query.is_empty())
                .map(str::to_string)
                .collect();
            if policy.is_empty() || queries.is_empty() {
                return Err(OrchestrationError::validation(
                    "Policy document and at least one user query are required.",
                ));
            }
            let language = parse_language(language)?;
            let policy = self.resolve_one(policy).await?;
            self.bridge
                .with_translation(
                    QueryRequest::new(policy, queries),
                    &language,
                    self.producers.query.as_ref(),
                )
                .await
        })
        .await
    }

    pub async fn check_compliance(
        &self,
        policy: &Document,
        standard: &str,
        language: &str,
    ) -> AnswerEnvelope<ComplianceReport> {
        self.run("compliance", COMPLIANCE_FAILURE, async {
            if policy.is_empty() || standard.trim().is_empty() {
                return Err(OrchestrationError::validation(
                    "Policy document and compliance standard are required.",
                ));
            }
            let language = parse_language(language)?;
            let policy = self.resolve_one(policy).await?;
            let request = ComplianceRequest {
                policy,
                standard: standard.trim().to_string(),
            };
            self.bridge
                .with_translation(request, &language, self.producers.compliance.as_ref())
                .await
        })
        .await
    }

    pub async fn detect_risks(&self, policy: &Document, language: &str) -> AnswerEnvelope<RiskReport> {
        self.run("risk", RISK_FAILURE, async {
            require_document(policy, "Policy document is required.")?;
            let language = parse_language(language)?;
            let policy = self.resolve_one(policy).await?;
            self.bridge
                .with_translation(RiskRequest { policy }, &language, self.producers.risk.as_ref())
                .await
        })
        .await
    }

    pub async fn suggest_improvements(
        &self,
        policy: &Document,
        language: &str,
    ) -> AnswerEnvelope<ImprovementReport> {
        self.run("improve", IMPROVE_FAILURE, async {
            require_document(policy, "Policy document is required.")?;
            let language = parse_language(language)?;
            let policy = self.resolve_one(policy).await?;
            self.bridge
                .with_translation(
                    ImproveRequest { policy },
                    &language,
                    self.producers.improve.as_ref(),
                )
                .await
        })
        .await
    }

    pub async fn translate_text(&self, text: &str, language: &str) -> AnswerEnvelope<TranslatedText> {
        self.run("translate", TRANSLATE_FAILURE, async {
            if text.trim().is_empty() {
                return Err(OrchestrationError::validation("Text to translate is required."));
            }
            let language = parse_language(language)?;
            let translated_text = self.bridge.translate_text(text, &language).await?;
            Ok(TranslatedText { translated_text })
        })
        .await
    }

    /// Resolve one document to plain text without involving any producer.
    pub async fn extract_document(&self, document: &Document) -> AnswerEnvelope<SourceText> {
        self.run("extract", EXTRACT_FAILURE, async {
            if matches!(document.content(), DocumentContent::Text(_)) {
                require_document(document, "Document is required.")?;
            }
            self.resolve_one(document).await
        })
        .await
    }

    async fn resolve_one(&self, document: &Document) -> Result<SourceText, OrchestrationError> {
        let mut sources = self.resolve_documents(std::slice::from_ref(document)).await?;
        sources.pop().ok_or_else(|| {
            OrchestrationError::Unexpected("document resolution returned nothing".to_string())
        })
    }

    /// Apply the upload policy, then turn every document into text. Binary
    /// documents go through the isolated extractor concurrently.
    async fn resolve_documents(
        &self,
        documents: &[Document],
    ) -> Result<Vec<SourceText>, OrchestrationError> {
        self.upload_policy
            .check(documents)
            .map_err(|err| OrchestrationError::validation(err.to_string()))?;
        try_join_all(documents.iter().map(|document| self.resolve(document))).await
    }

    async fn resolve(&self, document: &Document) -> Result<SourceText, OrchestrationError> {
        match document.content() {
            DocumentContent::Text(text) => Ok(SourceText::new(document.name(), text.clone())),
            DocumentContent::Binary {
                content_type,
                bytes,
            } => self
                .extractor
                .extract(bytes, content_type)
                .await
                .into_result()
                .map(|text| SourceText::new(document.name(), text))
                .map_err(|error| {
                    OrchestrationError::Extraction(format!("{}: {error}", document.name()))
                }),
        }
    }

    /// Await `work`, converting errors and panics into a failed envelope.
    async fn run<T, F>(&self, feature: &'static str, prefix: &str, work: F) -> AnswerEnvelope<T>
    where
        F: Future<Output = Result<T, OrchestrationError>>,
    {
        let start = Instant::now();
        let outcome = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(OrchestrationError::Unexpected(panic_message(panic.as_ref()))),
        };
        let elapsed_ms = start.elapsed().as_millis();
        match outcome {
            Ok(data) => {
                tracing::info!(feature, elapsed_ms, "request complete");
                AnswerEnvelope::ok(data)
            }
            Err(err) => {
                tracing::warn!(feature, elapsed_ms, kind = err.kind(), error = %err, "request failed");
                AnswerEnvelope::err(envelope_message(prefix, &err))
            }
        }
    }
}

fn envelope_message(prefix: &str, err: &OrchestrationError) -> String {
    match err {
        OrchestrationError::Validation(message) => message.clone(),
        other => format!("{prefix}: {other}"),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .map(|message| format!("internal error: {message}"))
        .unwrap_or_else(|| "internal error".to_string())
}

fn parse_language(code: &str) -> Result<LanguageCode, OrchestrationError> {
    LanguageCode::parse(code)
        .ok()
        .filter(LanguageCode::is_supported)
        .ok_or_else(|| OrchestrationError::validation(format!("Unsupported language {code:?}.")))
}

fn require_document(document: &Document, message: &str) -> Result<(), OrchestrationError> {
    if document.is_empty() {
        return Err(OrchestrationError::validation(message));
    }
    Ok(())
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
