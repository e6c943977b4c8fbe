//! git::mock
//!
//! Mock command runner for deterministic testing.
//!
//! Tests configure canned responses keyed by git subcommand and assert on
//! the exact invocations afterwards. Unmatched exchanges fail with exit
//! code 1 so a missing rule surfaces as a structured command error instead
//! of a hang.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gitfacts::git::{CommandRunner, MockRunner};
//!
//! # async fn example() {
//! let runner = Arc::new(
//!     MockRunner::new()
//!         .stdout("rev-parse", "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3\n"),
//! );
//!
//! let out = runner.run("git", &["rev-parse".into(), "HEAD".into()]).await.unwrap();
//! assert_eq!(out.code, 0);
//! assert_eq!(runner.calls().len(), 1);
//! # }
//! ```

use std::sync::Mutex;

use async_trait::async_trait;

use super::runner::{CommandRunner, ExecOutput};

type Responder = Box<dyn Fn(&[String]) -> Option<ExecOutput> + Send + Sync>;

struct Rule {
    subcommand: String,
    respond: Responder,
}

/// A [`CommandRunner`] that replays canned responses.
#[derive(Default)]
pub struct MockRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockRunner {
    /// Create a mock with no rules. Every exchange fails until rules are
    /// added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `subcommand` with a successful exchange printing `stdout`.
    pub fn stdout(self, subcommand: &str, stdout: &str) -> Self {
        let stdout = stdout.to_string();
        self.respond(subcommand, move |_| Some(ExecOutput::success(stdout.clone())))
    }

    /// Respond to `subcommand` with a failing exchange.
    pub fn failure(self, subcommand: &str, code: i32, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        self.respond(subcommand, move |_| {
            Some(ExecOutput::failure(code, stderr.clone()))
        })
    }

    /// Respond to `subcommand` with a computed exchange. Returning `None`
    /// passes the invocation on to the next matching rule, which allows
    /// argument-sensitive rules for the same subcommand.
    pub fn respond<F>(mut self, subcommand: &str, respond: F) -> Self
    where
        F: Fn(&[String]) -> Option<ExecOutput> + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            subcommand: subcommand.to_string(),
            respond: Box::new(respond),
        });
        self
    }

    /// Every argument list this runner has executed, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("mock calls lock").clone()
    }

    /// Argument lists for invocations of the given subcommand.
    pub fn calls_for(&self, subcommand: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|args| subcommand_of(args).is_some_and(|s| s == subcommand))
            .collect()
    }
}

/// The first positional argument, skipping `-c key=value` pairs and the
/// `--git-dir=`/`--work-tree=` root hints the doorway prepends.
fn subcommand_of(args: &[String]) -> Option<&str> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "-c" {
            iter.next();
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        return Some(arg.as_str());
    }
    None
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, _program: &str, args: &[String]) -> std::io::Result<ExecOutput> {
        self.calls
            .lock()
            .expect("mock calls lock")
            .push(args.to_vec());

        let subcommand = subcommand_of(args).unwrap_or("").to_string();
        for rule in &self.rules {
            if rule.subcommand == subcommand {
                if let Some(output) = (rule.respond)(args) {
                    return Ok(output);
                }
            }
        }

        Ok(ExecOutput::failure(
            1,
            format!("mock: no response configured for `{subcommand}`"),
        ))
    }
}
