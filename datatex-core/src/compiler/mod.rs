//! LaTeX compile pipeline.
//!
//! Each call stages the source in its own working directory, runs the
//! typesetting engine there with a wall-clock bound and reads back the PDF.
//! A semaphore caps how many engine processes run at once.

mod retention;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::config::CompilerConfig;
use crate::error::ErrorKind;

pub use retention::WORK_DIR_PREFIX;

/// Name of the staged source inside the working directory.
pub const SOURCE_FILE_NAME: &str = "document.tex";
/// Name of the PDF the engine is expected to produce.
pub const OUTPUT_FILE_NAME: &str = "document.pdf";

/// How long to keep reading engine output once the engine has exited or been
/// killed. Bounds the wait when a grandchild still holds the pipes.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct CompiledDocument {
    pub pdf: Vec<u8>,
    pub logs: String,
    /// Working directory, if the retention policy kept it.
    pub work_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileFailure {
    #[error("engine exited with status {}", exit_status(.exit_code))]
    ProcessFailed { exit_code: Option<i32> },

    #[error("engine timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("engine reported success but produced no PDF")]
    ArtifactMissing,

    #[error("compile setup failed")]
    Setup,
}

/// A failed compile together with everything the engine printed.
#[derive(Debug, Clone, Error)]
#[error("{failure}")]
pub struct CompileError {
    pub failure: CompileFailure,
    pub logs: String,
    pub work_dir: Option<PathBuf>,
}

impl CompileError {
    fn new(failure: CompileFailure, logs: impl Into<String>) -> Self {
        Self {
            failure,
            logs: logs.into(),
            work_dir: None,
        }
    }

    fn setup(logs: impl Into<String>) -> Self {
        Self::new(CompileFailure::Setup, logs)
    }

    pub fn kind(&self) -> ErrorKind {
        match self.failure {
            CompileFailure::ProcessFailed { .. } => ErrorKind::ProcessFailed,
            CompileFailure::Timeout(_) => ErrorKind::Timeout,
            CompileFailure::ArtifactMissing => ErrorKind::ArtifactMissing,
            CompileFailure::Setup => ErrorKind::Setup,
        }
    }
}

#[derive(Clone)]
pub struct Compiler {
    config: Arc<CompilerConfig>,
    permits: Arc<Semaphore>,
    in_flight: Arc<retention::InFlight>,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            config: Arc::new(config),
            permits,
            in_flight: Arc::default(),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a complete LaTeX document.
    pub async fn compile(&self, source: &str) -> Result<CompiledDocument, CompileError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| CompileError::setup("Compiler is shut down"))?;

        tokio::fs::create_dir_all(&self.config.work_root)
            .await
            .map_err(|e| {
                CompileError::setup(format!(
                    "Failed to create work root {}: {}",
                    self.config.work_root.display(),
                    e
                ))
            })?;

        let work_dir = self
            .in_flight
            .create(&self.config.work_root)
            .map_err(|e| CompileError::setup(format!("Failed to create working directory: {}", e)))?;

        tracing::debug!("Compiling in {}", work_dir.path().display());
        let outcome = self.run_engine(work_dir.path(), source).await;

        let kept = work_dir.finish(self.config.retention, &self.config.work_root, outcome.is_ok());

        match outcome {
            Ok(mut doc) => {
                tracing::info!("Compile succeeded ({} bytes)", doc.pdf.len());
                doc.work_dir = kept;
                Ok(doc)
            }
            Err(mut err) => {
                tracing::warn!("Compile failed: {}", err.failure);
                err.work_dir = kept;
                Err(err)
            }
        }
    }

    async fn run_engine(&self, dir: &Path, source: &str) -> Result<CompiledDocument, CompileError> {
        let input = dir.join(SOURCE_FILE_NAME);
        tokio::fs::write(&input, source)
            .await
            .map_err(|e| CompileError::setup(format!("Failed to write {}: {}", input.display(), e)))?;

        let mut cmd = Command::new(&self.config.engine);
        cmd.args(&self.config.engine_args)
            .arg("-interaction=nonstopmode")
            .arg("-shell-escape")
            .arg(format!("-output-directory={}", dir.display()))
            .arg(&input)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Output is read while the engine runs so a timeout still reports
        // everything printed before the kill.
        let mut child = cmd.spawn().map_err(|e| {
            CompileError::setup(format!("Failed to start {}: {}", self.config.engine, e))
        })?;

        let stdout = child.stdout.take().map(capture);
        let stderr = child.stderr.take().map(capture);

        let waited = tokio::time::timeout(self.config.timeout, child.wait()).await;
        if waited.is_err() {
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill {}: {}", self.config.engine, e);
            }
        }

        let (stdout, stderr) = tokio::join!(collect(stdout), collect(stderr));
        let mut logs = combined_logs(&stdout, &stderr);

        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                push_line(
                    &mut logs,
                    &format!("Failed to wait for {}: {}", self.config.engine, e),
                );
                return Err(CompileError::new(
                    CompileFailure::ProcessFailed { exit_code: None },
                    logs,
                ));
            }
            Err(_) => {
                push_line(
                    &mut logs,
                    &format!(
                        "Error: compilation timed out after {}s and was killed",
                        self.config.timeout.as_secs()
                    ),
                );
                return Err(CompileError::new(
                    CompileFailure::Timeout(self.config.timeout),
                    logs,
                ));
            }
        };

        if !status.success() {
            let failure = CompileFailure::ProcessFailed {
                exit_code: status.code(),
            };
            if logs.trim().is_empty() {
                logs = format!("Error: {}", failure);
            }
            return Err(CompileError::new(failure, logs));
        }

        let pdf_path = dir.join(OUTPUT_FILE_NAME);
        match tokio::fs::read(&pdf_path).await {
            Ok(pdf) => Ok(CompiledDocument {
                pdf,
                logs,
                work_dir: None,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                push_line(
                    &mut logs,
                    &format!("Error: PDF file was not created at {}", pdf_path.display()),
                );
                Err(CompileError::new(CompileFailure::ArtifactMissing, logs))
            }
            Err(e) => {
                push_line(
                    &mut logs,
                    &format!("Error: failed to read {}: {}", pdf_path.display(), e),
                );
                Err(CompileError::setup(logs))
            }
        }
    }

    /// Whether the configured engine can be started at all.
    pub async fn health_check(&self) -> bool {
        match Command::new(&self.config.engine)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }
}

fn exit_status(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

/// Engine output read on a background task into a shared buffer, so whatever
/// arrived before a kill is still available.
struct Captured {
    buf: Arc<Mutex<Vec<u8>>>,
    reader: JoinHandle<()>,
}

fn capture(stream: impl AsyncRead + Unpin + Send + 'static) -> Captured {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buf);
    let reader = tokio::spawn(async move {
        let mut stream = stream;
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
                Err(e) => {
                    tracing::debug!("Engine output read failed: {}", e);
                    break;
                }
            }
        }
    });
    Captured { buf, reader }
}

/// Wait up to [`OUTPUT_DRAIN_GRACE`] for the stream to close, then take what
/// was read.
async fn collect(captured: Option<Captured>) -> Vec<u8> {
    let Some(mut captured) = captured else {
        return Vec::new();
    };
    if tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut captured.reader)
        .await
        .is_err()
    {
        tracing::warn!("Engine output still open after exit, truncating");
        captured.reader.abort();
    }
    let bytes = std::mem::take(&mut *captured.buf.lock());
    bytes
}

/// stdout followed by stderr.
fn combined_logs(stdout: &[u8], stderr: &[u8]) -> String {
    let mut logs = String::from_utf8_lossy(stdout).into_owned();
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.is_empty() {
        push_line(&mut logs, &stderr);
    }
    logs
}

fn push_line(logs: &mut String, line: &str) {
    if !logs.is_empty() && !logs.ends_with('\n') {
        logs.push('\n');
    }
    logs.push_str(line);
}
