//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Isolated workspace for running the `doclens` binary.
///
/// Holds a config file and a scratch directory so runs never read the
/// user's own config or environment overrides.
pub struct Workspace {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

/// Parsed result of one CLI run.
#[derive(Debug)]
pub struct RunResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl RunResult {
    fn from_output(output: Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|err| panic!("stdout is not JSON ({err}): {}", self.stdout))
    }
}

pub fn doclens_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_doclens"))
}

impl Workspace {
    /// Workspace whose LM backend is a command that fails if invoked.
    pub fn new() -> Self {
        Self::with_lm_command("sh -c 'cat >/dev/null; echo no model in tests >&2; exit 3'")
    }

    pub fn with_lm_command(command: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        Self::configure(dir, command)
    }

    /// Workspace whose model ignores the prompt and prints `reply`.
    pub fn with_canned_reply(reply: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let reply_path = dir.path().join("reply.json");
        fs::write(&reply_path, reply).expect("write reply");
        let command = format!("sh -c 'cat >/dev/null; cat \"{}\"'", reply_path.display());
        Self::configure(dir, &command)
    }

    fn configure(dir: TempDir, command: &str) -> Self {
        let config_path = dir.path().join("config.json");
        let config = serde_json::json!({
            "lm": { "kind": "command", "command": command },
            "model_timeout_secs": 10,
            "lm_max_retries": 1,
            "extract_timeout_secs": 20,
            "worker_memory_limit_mb": null,
        });
        fs::write(&config_path, serde_json::to_vec_pretty(&config).expect("config json"))
            .expect("write config");
        Self { dir, config_path }
    }

    pub fn write_file(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, bytes).expect("write fixture");
        path
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(doclens_bin());
        command
            .arg("--config")
            .arg(&self.config_path)
            .env_remove("DOCLENS_LM_COMMAND")
            .env_remove("DOCLENS_LM_ENDPOINT")
            .env_remove("DOCLENS_LM_MODEL")
            .env("RUST_LOG", "doclens=warn");
        command
    }

    pub fn run(&self, args: &[&str]) -> RunResult {
        let output = self.command().args(args).output().expect("run doclens");
        RunResult::from_output(output)
    }

    pub fn run_with_stdin(&self, args: &[&str], stdin: &[u8]) -> RunResult {
        run_with_stdin(self.command().args(args), stdin)
    }
}

pub fn run_with_stdin(command: &mut Command, stdin: &[u8]) -> RunResult {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn doclens");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin)
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait for doclens");
    RunResult::from_output(output)
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

/// Build an in-memory PDF with one text line per page.
pub fn pdf_with_pages(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for line in lines {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let stream = Stream::new(dictionary! {}, content.encode().expect("encode content"));
        let content_id = doc.add_object(stream);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save pdf");
    bytes
}
