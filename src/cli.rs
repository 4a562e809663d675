//! CLI argument parsing.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "doclens",
    version,
    about = "Ask questions about documents and analyze policies with a language model",
    after_help = "Documents are file paths or data:<mime>;base64,<payload> URIs.\n\nExamples:\n  doclens extract report.pdf\n  doclens ask --doc lease.pdf \"When is rent due?\"\n  doclens chat --doc lease.pdf --doc addendum.txt\n  doclens risk policy.pdf --language es\n  doclens query policy.pdf --query \"Is flood covered?\" --query \"What is the deductible?\"\n  doclens compliance policy.pdf --standard GDPR",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Config file (defaults to <config dir>/doclens/config.json when present)
    #[arg(long, global = true, value_name = "PATH", env = "DOCLENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Display language for results (ISO 639-1 code)
    #[arg(long, short = 'l', global = true, value_name = "CODE", default_value = "en")]
    pub language: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract plain text from a document
    Extract(DocumentArgs),
    /// Ask one question about one or more documents
    Ask(AskArgs),
    /// Interactive question answering; one question per stdin line
    Chat(ChatArgs),
    /// Summarize a document with key points
    Summarize(DocumentArgs),
    /// Answer several queries against a policy document
    Query(QueryArgs),
    /// Check a policy against a compliance standard
    Compliance(ComplianceArgs),
    /// Identify risks in a policy document
    Risk(DocumentArgs),
    /// Suggest improvements to a draft policy
    Improve(DocumentArgs),
    /// Translate text into the display language
    Translate(TranslateArgs),
    /// List supported display languages
    Languages,
    /// Print the effective configuration
    Config(ConfigArgs),
    /// Extraction worker (reads a payload on stdin, writes one JSON line)
    #[command(hide = true)]
    ExtractWorker,
}

#[derive(Args, Debug)]
pub struct DocumentArgs {
    /// Document path or data URI
    #[arg(value_name = "DOCUMENT")]
    pub document: String,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Document path or data URI (repeatable)
    #[arg(long = "doc", value_name = "DOCUMENT", required = true)]
    pub documents: Vec<String>,

    /// Conversation session id
    #[arg(long, default_value = "cli")]
    pub session: String,

    pub question: String,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Document path or data URI (repeatable)
    #[arg(long = "doc", value_name = "DOCUMENT", required = true)]
    pub documents: Vec<String>,

    /// Print the full transcript as JSON when the session ends
    #[arg(long)]
    pub transcript: bool,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Policy document path or data URI
    #[arg(value_name = "DOCUMENT")]
    pub document: String,

    /// Query to answer (repeatable)
    #[arg(long = "query", short = 'q', value_name = "TEXT", required = true)]
    pub queries: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ComplianceArgs {
    /// Policy document path or data URI
    #[arg(value_name = "DOCUMENT")]
    pub document: String,

    /// Standard to check against, e.g. GDPR or HIPAA
    #[arg(long)]
    pub standard: String,
}

#[derive(Args, Debug)]
pub struct TranslateArgs {
    pub text: String,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print a default config stub instead of the effective config
    #[arg(long)]
    pub stub: bool,
}
