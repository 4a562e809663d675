use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Command, RootArgs};
use doclens::config::{config_stub, load_config, Config};
use doclens::document::Document;
use doclens::extract::worker::run_worker_stdio;
use doclens::extract::{ENV_MEMORY_LIMIT_MB, ENV_MIME_HINT};
use doclens::language::SUPPORTED_LANGUAGES;
use doclens::{AnswerEnvelope, Orchestrator};

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing();
    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout carries JSON results and the worker protocol.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("doclens=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: RootArgs) -> Result<ExitCode> {
    // The worker never touches config or the async runtime.
    if let Command::ExtractWorker = args.command {
        let mime_hint = std::env::var(ENV_MIME_HINT).unwrap_or_default();
        let memory_limit_mb = match std::env::var(ENV_MEMORY_LIMIT_MB) {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("parse {ENV_MEMORY_LIMIT_MB}={raw:?}"))?,
            ),
            Err(_) => None,
        };
        run_worker_stdio(&mime_hint, memory_limit_mb)?;
        return Ok(ExitCode::SUCCESS);
    }

    match &args.command {
        Command::Languages => return print_json(&SUPPORTED_LANGUAGES).map(|()| ExitCode::SUCCESS),
        Command::Config(config_args) if config_args.stub => {
            println!("{}", config_stub()?);
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let config = load_config(args.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start tokio runtime")?;
    runtime.block_on(dispatch(args, config))
}

async fn dispatch(args: RootArgs, config: Config) -> Result<ExitCode> {
    if let Command::Config(_) = args.command {
        print_json(&config)?;
        return Ok(ExitCode::SUCCESS);
    }

    let orchestrator = Orchestrator::from_config(&config)?;
    let language = args.language.as_str();
    match args.command {
        Command::Extract(doc) => {
            let document = load_document(&doc.document)?;
            print_envelope(&orchestrator.extract_document(&document).await)
        }
        Command::Ask(ask) => {
            let documents = load_documents(&ask.documents)?;
            let envelope = orchestrator
                .ask_document(&ask.session, &documents, &ask.question, language)
                .await;
            print_envelope(&envelope)
        }
        Command::Chat(chat) => {
            let documents = load_documents(&chat.documents)?;
            run_chat(&orchestrator, &documents, language, chat.transcript).await
        }
        Command::Summarize(doc) => {
            let document = load_document(&doc.document)?;
            print_envelope(&orchestrator.summarize_document(&document, language).await)
        }
        Command::Query(query) => {
            let document = load_document(&query.document)?;
            let envelope = orchestrator
                .summarize_queries(&document, &query.queries, language)
                .await;
            print_envelope(&envelope)
        }
        Command::Compliance(compliance) => {
            let document = load_document(&compliance.document)?;
            let envelope = orchestrator
                .check_compliance(&document, &compliance.standard, language)
                .await;
            print_envelope(&envelope)
        }
        Command::Risk(doc) => {
            let document = load_document(&doc.document)?;
            print_envelope(&orchestrator.detect_risks(&document, language).await)
        }
        Command::Improve(doc) => {
            let document = load_document(&doc.document)?;
            print_envelope(&orchestrator.suggest_improvements(&document, language).await)
        }
        Command::Translate(translate) => {
            print_envelope(&orchestrator.translate_text(&translate.text, language).await)
        }
        Command::Languages | Command::Config(_) | Command::ExtractWorker => Ok(ExitCode::SUCCESS),
    }
}

/// One question per line until EOF or `exit`. Each answer is printed as a
/// single JSON line.
async fn run_chat(
    orchestrator: &Orchestrator,
    documents: &[Document],
    language: &str,
    transcript: bool,
) -> Result<ExitCode> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut failures = 0usize;

    while let Some(line) = lines.next_line().await.context("read question from stdin")? {
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }
        let envelope = orchestrator
            .ask_document(&session_id, documents, question, language)
            .await;
        if !envelope.is_ok() {
            failures += 1;
        }
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", serde_json::to_string(&envelope)?).context("write answer")?;
        stdout.flush().context("flush stdout")?;
    }

    if transcript {
        print_json(&orchestrator.session_turns(&session_id))?;
    }
    orchestrator.sessions().remove(&session_id);
    tracing::info!(failures, "chat session ended");
    Ok(ExitCode::SUCCESS)
}

fn load_document(source: &str) -> Result<Document> {
    load_named(source, "upload")
}

/// Data URIs carry no file name; number them so attribution can tell them apart.
fn load_documents(sources: &[String]) -> Result<Vec<Document>> {
    sources
        .iter()
        .enumerate()
        .map(|(index, source)| load_named(source, &format!("upload-{}", index + 1)))
        .collect()
}

fn load_named(source: &str, data_name: &str) -> Result<Document> {
    if source.starts_with("data:") {
        return Document::from_data_uri(data_name, source);
    }
    Document::from_path(Path::new(source))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{text}");
    Ok(())
}

/// Print the envelope; a failed envelope exits non-zero.
fn print_envelope<T: Serialize>(envelope: &AnswerEnvelope<T>) -> Result<ExitCode> {
    print_json(envelope)?;
    Ok(if envelope.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
