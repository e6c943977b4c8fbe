//! git::runner
//!
//! External command runner contract.
//!
//! Process execution is a collaborator, not part of the core: the rest of
//! the crate only ever sees the [`CommandRunner`] trait, injected at
//! construction. [`ProcessRunner`] is the production implementation backed
//! by `tokio::process`; [`super::MockRunner`] provides deterministic canned
//! responses for tests.

use async_trait::async_trait;

/// Captured result of one external command exchange.
///
/// Standard output and error are drained to completion before the exchange
/// resolves; the exit code is the single completion signal.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Process exit code (`-1` if terminated by a signal).
    pub code: i32,
    /// Drained standard output bytes.
    pub stdout: Vec<u8>,
    /// Drained standard error bytes.
    pub stderr: Vec<u8>,
}

impl ExecOutput {
    /// A successful exchange with the given standard output.
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// A failed exchange with the given exit code and standard error.
    pub fn failure(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    /// Standard output as (lossy) UTF-8.
    pub fn stdout_utf8(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error as (lossy) UTF-8.
    pub fn stderr_utf8(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Executes an external program with a flattened argument list.
///
/// Implementations must drain both output streams and resolve only once the
/// process has exited. Spawn failures surface as `io::Error`; a non-zero
/// exit is *not* an error at this boundary. The [`super::Git`] doorway
/// converts it into a structured [`super::GitError::Command`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and capture its output.
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<ExecOutput>;
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a new process runner.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<ExecOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .output()
            .await?;

        Ok(ExecOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
