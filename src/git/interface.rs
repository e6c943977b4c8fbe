//! git::interface
//!
//! Git interface implementation over an injected command runner.
//!
//! This module provides the **single doorway** to the external git
//! executable. All protocol exchanges flow through this interface, which
//! encodes argument lists, prepends persistent configuration overrides and
//! root hints, and normalizes failures into typed error variants.
//!
//! # Architecture
//!
//! The `Git` struct is the only way to talk to the executable. No other
//! module should build a git argument list directly. This ensures:
//!
//! - Consistent flag encoding across all exchanges
//! - Root hints (`--git-dir=`/`--work-tree=`) applied uniformly
//! - Non-zero exits converted into structured errors carrying the argument
//!   list, the hints and overrides in effect, and the captured output
//!
//! # Argument encoding
//!
//! Structured arguments flatten the way the listing protocols expect:
//! boolean flags become `--name`/`--no-name`, key/value options become
//! `--name=value`, nested argument lists expand recursively, and persistent
//! overrides are emitted as `-c key=value` pairs ahead of everything else.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gitfacts::git::{Git, GitOptions, MockRunner};
//!
//! # async fn example() -> Result<(), gitfacts::git::GitError> {
//! let runner = Arc::new(MockRunner::new().stdout(
//!     "rev-parse",
//!     "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3\n",
//! ));
//! let git = Git::new(runner).with_gitdir("/repo/.git");
//!
//! let oid = git.rev_parse("HEAD").await?;
//! assert_eq!(oid.short(7), "a94a8fe");
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::core::types::{Oid, TypeError};

use super::runner::{CommandRunner, ExecOutput};

/// Errors from repository discovery and protocol exchanges.
///
/// The taxonomy is small and closed: discovery can fail to find a root or
/// trip over a malformed indirection marker, and an exchange can fail to
/// spawn or exit non-zero. Every variant is `Clone` so errors can ride a
/// fact bus as payloads.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GitError {
    /// Walked to the filesystem root without locating a metadata root.
    #[error("no git repository found above {}", start.display())]
    NotFound {
        /// The directory the ancestor walk started from.
        start: PathBuf,
    },

    /// An indirection marker file did not match the required
    /// `gitdir: <path>` shape.
    #[error("unexpected marker content in {}: {content:?}", path.display())]
    Format {
        /// The marker file that was read.
        path: PathBuf,
        /// Its raw content.
        content: String,
    },

    /// The external command exited non-zero.
    #[error("`git {}` exited with code {code}: {stderr}", args.join(" "))]
    Command {
        /// The full argument list used.
        args: Vec<String>,
        /// Root hint in effect.
        gitdir: Option<PathBuf>,
        /// Root hint in effect.
        worktree: Option<PathBuf>,
        /// Persistent configuration overrides in effect.
        overrides: Vec<(String, String)>,
        /// Process exit code.
        code: i32,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The external executable failed to launch.
    #[error("failed to spawn `{program}`: {message}")]
    Spawn {
        /// The program that could not be launched.
        program: String,
        /// The underlying I/O error rendered as text.
        message: String,
    },

    /// A filesystem probe or read failed during discovery.
    #[error("{}: {message}", path.display())]
    Io {
        /// The path being probed or read.
        path: PathBuf,
        /// The underlying I/O error rendered as text.
        message: String,
    },

    /// A protocol exchange produced structurally invalid data.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// A fact producer was dropped before publishing its terminal fact.
    /// Not reachable while the producing component is still held.
    #[error("fact producer dropped before publishing")]
    Interrupted,

    /// An input at an options boundary failed to parse.
    #[error("invalid {what} {input:?}: {message}")]
    Parse {
        /// What was being parsed (e.g. `"semver range"`).
        what: &'static str,
        /// The offending input.
        input: String,
        /// Parser diagnostic.
        message: String,
    },
}

impl GitError {
    /// Wrap a filesystem error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// One value in a structured option set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opt {
    /// Encodes as `--name`.
    On,
    /// Encodes as `--no-name`.
    Off,
    /// Encodes as `--name=value`.
    Value(String),
}

/// A structured option set, flattened deterministically (key order).
///
/// # Example
///
/// ```
/// use gitfacts::git::GitOptions;
///
/// let opts = GitOptions::new()
///     .flag("force", true)
///     .flag("track", false)
///     .value("depth", "1");
/// assert_eq!(opts.flatten(), vec!["--depth=1", "--force", "--no-track"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOptions(BTreeMap<String, Opt>);

impl GitOptions {
    /// An empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a boolean flag (`--name` when true, `--no-name` when false).
    pub fn flag(mut self, name: &str, on: bool) -> Self {
        self.0
            .insert(name.to_string(), if on { Opt::On } else { Opt::Off });
        self
    }

    /// Add a key/value option (`--name=value`).
    pub fn value(mut self, name: &str, value: impl Into<String>) -> Self {
        self.0.insert(name.to_string(), Opt::Value(value.into()));
        self
    }

    /// Whether no options were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flatten into `--name` / `--no-name` / `--name=value` strings.
    pub fn flatten(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|(name, opt)| match opt {
                Opt::On => format!("--{name}"),
                Opt::Off => format!("--no-{name}"),
                Opt::Value(value) => format!("--{name}={value}"),
            })
            .collect()
    }
}

/// One element of an exchange's argument list.
#[derive(Debug, Clone)]
pub enum Arg {
    /// A verbatim argument.
    Raw(String),
    /// A structured option set, flattened in place.
    Opts(GitOptions),
    /// A nested argument list, expanded recursively.
    Many(Vec<Arg>),
}

impl Arg {
    /// A verbatim argument.
    pub fn raw(s: impl Into<String>) -> Self {
        Self::Raw(s.into())
    }

    /// A structured option set.
    pub fn opts(opts: GitOptions) -> Self {
        Self::Opts(opts)
    }
}

/// Flatten a structured argument list into plain strings.
fn normalize(args: &[Arg], out: &mut Vec<String>) {
    for arg in args {
        match arg {
            Arg::Raw(s) => out.push(s.clone()),
            Arg::Opts(opts) => out.extend(opts.flatten()),
            Arg::Many(nested) => normalize(nested, out),
        }
    }
}

/// The single doorway to the external git executable.
///
/// Holds the executable name, optional root hints, and persistent
/// configuration overrides; delegates execution to the injected
/// [`CommandRunner`].
#[derive(Clone)]
pub struct Git {
    program: String,
    gitdir: Option<PathBuf>,
    worktree: Option<PathBuf>,
    overrides: BTreeMap<String, String>,
    runner: Arc<dyn CommandRunner>,
}

impl Git {
    /// Create a doorway around the given runner, targeting `git` on the
    /// search path with no root hints.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program: "git".to_string(),
            gitdir: None,
            worktree: None,
            overrides: BTreeMap::new(),
            runner,
        }
    }

    /// Use a different executable path.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Pin the metadata root (`--git-dir=`).
    pub fn with_gitdir(mut self, gitdir: impl Into<PathBuf>) -> Self {
        self.gitdir = Some(gitdir.into());
        self
    }

    /// Pin the worktree (`--work-tree=`).
    pub fn with_worktree(mut self, worktree: impl Into<PathBuf>) -> Self {
        self.worktree = Some(worktree.into());
        self
    }

    /// Add a persistent configuration override, emitted as `-c key=value`
    /// on every exchange.
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// The pinned metadata root, if any.
    pub fn gitdir(&self) -> Option<&Path> {
        self.gitdir.as_deref()
    }

    /// The pinned worktree, if any.
    pub fn worktree(&self) -> Option<&Path> {
        self.worktree.as_deref()
    }

    /// The `-c key=value` pairs and root hints prepended to every exchange.
    fn base_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (key, value) in &self.overrides {
            args.push("-c".to_string());
            args.push(format!("{key}={value}"));
        }
        if let Some(gitdir) = &self.gitdir {
            args.push(format!("--git-dir={}", gitdir.display()));
        }
        if let Some(worktree) = &self.worktree {
            args.push(format!("--work-tree={}", worktree.display()));
        }
        args
    }

    /// Run one exchange. A non-zero exit becomes [`GitError::Command`]
    /// carrying the argument list, hints, overrides, and captured output.
    pub async fn run(&self, args: &[Arg]) -> Result<ExecOutput, GitError> {
        let mut argv = self.base_args();
        normalize(args, &mut argv);

        trace!(program = %self.program, args = ?argv, "running git exchange");

        let output = self
            .runner
            .run(&self.program, &argv)
            .await
            .map_err(|err| GitError::Spawn {
                program: self.program.clone(),
                message: err.to_string(),
            })?;

        if output.code != 0 {
            return Err(GitError::Command {
                args: argv,
                gitdir: self.gitdir.clone(),
                worktree: self.worktree.clone(),
                overrides: self
                    .overrides
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                code: output.code,
                stdout: output.stdout_utf8(),
                stderr: output.stderr_utf8(),
            });
        }

        Ok(output)
    }

    /// Run one exchange and return its standard output as text.
    async fn run_capture(&self, args: &[Arg]) -> Result<String, GitError> {
        Ok(self.run(args).await?.stdout_utf8())
    }

    /// `git config <selector> --list`
    pub async fn config_list(&self, selector: GitOptions) -> Result<String, GitError> {
        self.run_capture(&[
            Arg::raw("config"),
            Arg::opts(selector),
            Arg::raw("--list"),
        ])
        .await
    }

    /// `git config --blob=<oid> --list`
    pub async fn config_blob(&self, blob: &Oid) -> Result<String, GitError> {
        self.config_list(GitOptions::new().value("blob", blob.as_str()))
            .await
    }

    /// `git rev-parse <rev>`, parsed into a validated object id.
    pub async fn rev_parse(&self, rev: &str) -> Result<Oid, GitError> {
        let stdout = self
            .run_capture(&[Arg::raw("rev-parse"), Arg::raw(rev)])
            .await?;
        let line = stdout.lines().next().unwrap_or("").trim();
        Ok(Oid::new(line)?)
    }

    /// `git show-ref`, parsed into `(commit, ref-path)` records.
    pub async fn show_ref(&self) -> Result<Vec<(Oid, String)>, GitError> {
        let stdout = self.run_capture(&[Arg::raw("show-ref")]).await?;
        let mut refs = Vec::new();
        for line in stdout.lines() {
            if line.is_empty() {
                continue;
            }
            let (commit, name) = line.split_once(' ').ok_or_else(|| {
                TypeError::InvalidOid(format!("malformed show-ref record: {line:?}"))
            })?;
            refs.push((Oid::new(commit)?, name.to_string()));
        }
        Ok(refs)
    }

    /// `git ls-tree <rev>` raw listing.
    pub async fn ls_tree(&self, rev: &str) -> Result<String, GitError> {
        self.run_capture(&[Arg::raw("ls-tree"), Arg::raw(rev)]).await
    }

    /// `git checkout [opts] <rev>`
    pub async fn checkout(&self, opts: GitOptions, rev: &str) -> Result<ExecOutput, GitError> {
        self.run(&[Arg::raw("checkout"), Arg::opts(opts), Arg::raw(rev)])
            .await
    }

    /// `git tag [opts] <name> <rev>`
    pub async fn tag(&self, opts: GitOptions, name: &str, rev: &str) -> Result<ExecOutput, GitError> {
        self.run(&[
            Arg::raw("tag"),
            Arg::opts(opts),
            Arg::raw(name),
            Arg::raw(rev),
        ])
        .await
    }

    /// `git branch [opts] <name> <rev>`
    pub async fn branch(
        &self,
        opts: GitOptions,
        name: &str,
        rev: &str,
    ) -> Result<ExecOutput, GitError> {
        self.run(&[
            Arg::raw("branch"),
            Arg::opts(opts),
            Arg::raw(name),
            Arg::raw(rev),
        ])
        .await
    }
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("program", &self.program)
            .field("gitdir", &self.gitdir)
            .field("worktree", &self.worktree)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}
