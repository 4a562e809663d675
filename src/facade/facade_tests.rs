use super::*;
use crate::bridge::Translatable;
use crate::extract::WorkerCommand;
use crate::features::improve::Improvement;
use crate::features::risk::{RiskItem, RiskLevel};
use anyhow::anyhow;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Handler<I, O> = Box<dyn Fn(I) -> anyhow::Result<O> + Send + Sync>;

/// Producer driven by a closure; records how often it ran.
struct FnProducer<I, O> {
    calls: AtomicUsize,
    handler: Handler<I, O>,
}

impl<I, O> FnProducer<I, O> {
    fn new(handler: impl Fn(I) -> anyhow::Result<O> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            handler: Box::new(handler),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<I, O> AnswerProducer for FnProducer<I, O>
where
    I: Translatable + Send + 'static,
    O: Translatable + Send + 'static,
{
    type Input = I;
    type Output = O;

    async fn invoke(&self, input: I) -> anyhow::Result<O> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(input)
    }
}

struct UpperTranslator;

#[async_trait]
impl Translator for UpperTranslator {
    async fn translate(&self, text: &str, target: &LanguageCode) -> anyhow::Result<String> {
        Ok(format!("{}:{}", target, text.to_uppercase()))
    }
}

fn unexpected<I, O>() -> Producer<I, O>
where
    I: Translatable + Send + 'static,
    O: Translatable + Send + 'static,
{
    FnProducer::<I, O>::new(|_| Err(anyhow!("producer should not be called")))
}

fn producers() -> Producers {
    Producers {
        ask: unexpected(),
        summary: unexpected(),
        query: unexpected(),
        compliance: unexpected(),
        risk: unexpected(),
        improve: unexpected(),
    }
}

fn worker(script: &str) -> WorkerCommand {
    WorkerCommand {
        program: PathBuf::from("sh"),
        args: vec!["-c".to_string(), script.to_string()],
    }
}

fn orchestrator_with(producers: Producers, worker: WorkerCommand) -> Orchestrator {
    Orchestrator::new(
        IsolatedExtractor::new(worker, Duration::from_secs(10), 1024 * 1024),
        LanguageBridge::new(Arc::new(UpperTranslator), LanguageCode::canonical(), 4),
        producers,
        UploadPolicy {
            max_documents: 2,
            allowed_content_types: vec!["text/*".to_string(), "application/pdf".to_string()],
        },
    )
}

fn orchestrator(producers: Producers) -> Orchestrator {
    orchestrator_with(producers, worker("exit 99"))
}

fn policy() -> Document {
    Document::text("policy.txt", "Section 1. Data is retained for 10 years.")
}

fn risk_report() -> RiskReport {
    RiskReport {
        overall_risk_assessment: "High exposure".to_string(),
        risk_report: vec![RiskItem {
            risk_level: RiskLevel::High,
            risk_area: "Retention".to_string(),
            description: "Data kept too long".to_string(),
            suggestion: "Shorten retention".to_string(),
        }],
    }
}

#[tokio::test]
async fn validation_fails_fast_without_producer_calls() {
    let risk = FnProducer::new(|_: RiskRequest| Ok(risk_report()));
    let compliance = FnProducer::new(|_: ComplianceRequest| -> anyhow::Result<ComplianceReport> {
        Err(anyhow!("unused"))
    });
    let orchestrator = orchestrator(Producers {
        risk: risk.clone(),
        compliance: compliance.clone(),
        ..producers()
    });

    let envelope = orchestrator
        .detect_risks(&Document::text("empty.txt", "   "), "en")
        .await;
    assert_eq!(envelope.error(), Some("Policy document is required."));
    assert!(envelope.data().is_none());

    let envelope = orchestrator.check_compliance(&policy(), "", "en").await;
    assert_eq!(
        envelope.error(),
        Some("Policy document and compliance standard are required.")
    );

    let envelope = orchestrator.detect_risks(&policy(), "xx").await;
    assert_eq!(envelope.error(), Some("Unsupported language \"xx\"."));

    let envelope = orchestrator
        .ask_document("s1", &[], "What is retained?", "en")
        .await;
    assert!(envelope.error().unwrap().contains("At least one document"));

    assert_eq!(risk.calls(), 0);
    assert_eq!(compliance.calls(), 0);
    assert!(orchestrator.sessions().is_empty());
}

#[tokio::test]
async fn upload_policy_is_enforced_before_producers() {
    let risk = FnProducer::new(|_: RiskRequest| Ok(risk_report()));
    let orchestrator = orchestrator(Producers {
        risk: risk.clone(),
        ..producers()
    });

    let image = Document::binary("scan.png", "image/png", vec![1, 2, 3]);
    let envelope = orchestrator.detect_risks(&image, "en").await;
    assert!(envelope.error().unwrap().contains("unsupported content type"));

    let docs = vec![policy(), policy(), policy()];
    let envelope = orchestrator.ask_document("s1", &docs, "q?", "en").await;
    assert!(envelope.error().unwrap().contains("at most 2 documents"));
    assert_eq!(risk.calls(), 0);
}

#[tokio::test]
async fn success_envelope_carries_only_data() {
    let orchestrator = orchestrator(Producers {
        risk: FnProducer::new(|request: RiskRequest| {
            assert!(request.policy.text.contains("10 years"));
            Ok(risk_report())
        }),
        ..producers()
    });

    let envelope = orchestrator.detect_risks(&policy(), "en").await;
    assert!(envelope.is_ok());
    assert!(envelope.error().is_none());
    assert_eq!(envelope.data(), Some(&risk_report()));
}

#[tokio::test]
async fn outbound_translation_reaches_every_leaf() {
    let orchestrator = orchestrator(Producers {
        improve: FnProducer::new(|_: ImproveRequest| {
            Ok(ImprovementReport {
                summary: "good".to_string(),
                improvements: vec![Improvement {
                    title: "clarity".to_string(),
                    details: "define terms".to_string(),
                }],
            })
        }),
        ..producers()
    });

    let report = orchestrator
        .suggest_improvements(&policy(), "es")
        .await
        .into_result()
        .unwrap();
    assert_eq!(report.summary, "es:GOOD");
    assert_eq!(report.improvements[0].title, "es:CLARITY");
    assert_eq!(report.improvements[0].details, "es:DEFINE TERMS");
}

#[tokio::test]
async fn producer_failure_is_prefixed() {
    let orchestrator = orchestrator(Producers {
        compliance: FnProducer::new(|_: ComplianceRequest| -> anyhow::Result<ComplianceReport> {
            Err(anyhow!("model unavailable"))
        }),
        ..producers()
    });

    let envelope = orchestrator.check_compliance(&policy(), "GDPR", "fr").await;
    assert!(envelope.data().is_none());
    assert_eq!(
        envelope.error(),
        Some("Failed to check compliance: model unavailable")
    );
}

#[tokio::test]
async fn panics_are_caught_and_reported() {
    let orchestrator = orchestrator(Producers {
        query: FnProducer::new(|_: QueryRequest| -> anyhow::Result<QuerySummary> {
            panic!("index out of bounds")
        }),
        ..producers()
    });

    let envelope = orchestrator
        .summarize_queries(&policy(), &["Is flood covered?".to_string()], "en")
        .await;
    let error = envelope.error().unwrap();
    assert!(error.starts_with("Failed to generate summary: "), "{error}");
    assert!(error.contains("index out of bounds"), "{error}");
}

#[tokio::test]
async fn blank_queries_are_dropped_before_validation() {
    let query = FnProducer::new(|request: QueryRequest| {
        assert_eq!(request.queries, vec!["Limit?".to_string()]);
        Ok(QuerySummary { answers: vec![] })
    });
    let orchestrator = orchestrator(Producers {
        query: query.clone(),
        ..producers()
    });

    let envelope = orchestrator
        .summarize_queries(&policy(), &[" ".to_string()], "en")
        .await;
    assert!(envelope.error().unwrap().contains("at least one user query"));

    let envelope = orchestrator
        .summarize_queries(&policy(), &["".to_string(), "Limit?".to_string()], "en")
        .await;
    assert!(envelope.is_ok());
    assert_eq!(query.calls(), 1);
}

#[tokio::test]
async fn translate_text_is_identity_for_canonical_language() {
    let orchestrator = orchestrator(producers());
    let same = orchestrator.translate_text("Hello", "en").await.into_result().unwrap();
    assert_eq!(same.translated_text, "Hello");

    let french = orchestrator.translate_text("Hello", "fr").await.into_result().unwrap();
    assert_eq!(french.translated_text, "fr:HELLO");

    let envelope = orchestrator.translate_text("", "fr").await;
    assert_eq!(envelope.error(), Some("Text to translate is required."));
}

#[tokio::test]
async fn ask_document_builds_history_across_questions() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let ask = {
        let seen = seen.clone();
        FnProducer::new(move |request: AskRequest| {
            let mut seen = seen.lock().unwrap();
            seen.push(request.history.len());
            Ok(AskAnswer {
                answer: format!("answer {}", seen.len()),
                source_document: Some("policy.txt".to_string()),
            })
        })
    };
    let orchestrator = orchestrator(Producers {
        ask,
        ..producers()
    });
    let docs = [policy()];

    let first = orchestrator
        .ask_document("s1", &docs, "How long is data kept?", "en")
        .await
        .into_result()
        .unwrap();
    assert_eq!(first.source_document.as_deref(), Some("policy.txt"));
    orchestrator
        .ask_document("s1", &docs, "Can I delete it?", "en")
        .await
        .into_result()
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![0, 2]);
    let turns = orchestrator.session_turns("s1");
    let texts: Vec<&str> = turns.iter().map(|turn| turn.text()).collect();
    assert_eq!(
        texts,
        vec!["How long is data kept?", "answer 1", "Can I delete it?", "answer 2"]
    );
    assert!(orchestrator.session_turns("other").is_empty());
}

#[tokio::test]
async fn ask_failure_leaves_history_unchanged() {
    let calls = Arc::new(AtomicUsize::new(0));
    let ask = {
        let calls = calls.clone();
        FnProducer::new(move |_: AskRequest| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(AskAnswer {
                    answer: "first".to_string(),
                    source_document: Some("made-up.pdf".to_string()),
                })
            } else {
                Err(anyhow!("quota exceeded"))
            }
        })
    };
    let orchestrator = orchestrator(Producers {
        ask,
        ..producers()
    });
    let docs = [policy()];

    let first = orchestrator
        .ask_document("s1", &docs, "q1", "en")
        .await
        .into_result()
        .unwrap();
    // Attribution to a document that was never supplied is dropped.
    assert_eq!(first.source_document, None);

    let envelope = orchestrator.ask_document("s1", &docs, "q2", "en").await;
    assert_eq!(
        envelope.error(),
        Some("Failed to get answer from document: quota exceeded")
    );
    assert_eq!(orchestrator.session_turns("s1").len(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn binary_documents_go_through_the_extractor() {
    let summary = FnProducer::new(|request: SummaryRequest| {
        assert_eq!(request.document.name, "report.pdf");
        assert!(request.document.text.starts_with("--- Page 1 ---"));
        Ok(DocumentSummary {
            summary: "short".to_string(),
            key_points: vec!["one".to_string()],
        })
    });
    let orchestrator = orchestrator_with(
        Producers {
            summary: summary.clone(),
            ..producers()
        },
        worker(r#"cat >/dev/null; printf '%s\n' '{"success":true,"text":"--- Page 1 ---\nbody\n\n"}'"#),
    );

    let pdf = Document::binary("report.pdf", "application/pdf", b"%PDF-1.7".to_vec());
    let envelope = orchestrator.summarize_document(&pdf, "en").await;
    assert!(envelope.is_ok(), "{:?}", envelope.error());
    assert_eq!(summary.calls(), 1);

    let extracted = orchestrator.extract_document(&pdf).await.into_result().unwrap();
    assert_eq!(extracted.text, "--- Page 1 ---\nbody\n\n");
}

#[cfg(unix)]
#[tokio::test]
async fn extraction_failure_skips_the_producer() {
    let risk = FnProducer::new(|_: RiskRequest| Ok(risk_report()));
    let orchestrator = orchestrator_with(
        Producers {
            risk: risk.clone(),
            ..producers()
        },
        worker("cat >/dev/null; echo 'segfault in parser' >&2; exit 139"),
    );

    let pdf = Document::binary("broken.pdf", "application/pdf", b"%PDF-garbage".to_vec());
    let envelope = orchestrator.detect_risks(&pdf, "en").await;
    let error = envelope.error().unwrap();
    assert!(
        error.starts_with("Failed to detect risks: document extraction failed: broken.pdf: "),
        "{error}"
    );
    assert!(error.contains("segfault in parser"), "{error}");
    assert_eq!(risk.calls(), 0);

    let empty = Document::binary("empty.pdf", "application/pdf", Vec::new());
    let envelope = orchestrator.extract_document(&empty).await;
    assert!(envelope.error().unwrap().contains("document is empty"));
}
