//! repo::repository
//!
//! The repository facade.
//!
//! A [`Repository`] owns one fact bus, one operation queue, and the
//! injected command runner, nothing else. Accessors spawn providers and
//! feed them by forwarding facts from the repository bus; providers never
//! see the facade. Destructive operations gate on the
//! `GitDir`+`Worktree`+`Commit` aggregation and serialize through the
//! exclusive class of the queue.
//!
//! # Example
//!
//! ```ignore
//! use gitfacts::Repository;
//!
//! # async fn example() -> Result<(), gitfacts::GitError> {
//! let repo = Repository::open(".");
//!
//! // Lazily resolved facts; requests may be issued before the root is
//! // known.
//! let tags = repo.tags().wait().await?;
//! let latest = repo.latest("1.x").await?;
//!
//! // Destructive operations serialize against each other.
//! repo.checkout("main", Default::default()).wait().await?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::bus::{FactBus, FactName, FactValue};
use crate::core::types::RefFact;
use crate::git::{CommandRunner, ExecOutput, Git, GitError, GitOptions, ProcessRunner};
use crate::providers::config::{Config, ConfigOptions, ConfigScope};
use crate::providers::reference::{Reference, ReferenceOptions};
use crate::providers::refs::{Refs, RefsOptions};
use crate::providers::submodules::{Submodules, SubmodulesOptions};
use crate::providers::versions::{Versions, VersionsOptions};
use crate::sched::OpQueue;

use super::resolver;

/// Default shared-class concurrency for a repository's operation queue.
pub const DEFAULT_MAX_SHARED: usize = 4;

/// Canonical construction options.
///
/// Accepts a plain path (the starting directory for discovery) or an
/// explicit record with root hints; the conversion happens once at this
/// boundary.
#[derive(Debug, Clone, Default)]
pub struct RepoOptions {
    /// Starting directory for ancestor discovery. Defaults to the process
    /// working directory when no hint is given.
    pub cwd: Option<PathBuf>,
    /// Explicit metadata root; skips discovery.
    pub gitdir: Option<PathBuf>,
    /// Explicit worktree; its `.git` entry locates the metadata root.
    pub worktree: Option<PathBuf>,
    /// Shared-class concurrency for the operation queue.
    pub max_shared: Option<usize>,
}

impl From<&str> for RepoOptions {
    fn from(cwd: &str) -> Self {
        Self {
            cwd: Some(PathBuf::from(cwd)),
            ..Self::default()
        }
    }
}

impl From<String> for RepoOptions {
    fn from(cwd: String) -> Self {
        Self {
            cwd: Some(PathBuf::from(cwd)),
            ..Self::default()
        }
    }
}

impl From<&std::path::Path> for RepoOptions {
    fn from(cwd: &std::path::Path) -> Self {
        Self {
            cwd: Some(cwd.to_path_buf()),
            ..Self::default()
        }
    }
}

impl From<PathBuf> for RepoOptions {
    fn from(cwd: PathBuf) -> Self {
        Self {
            cwd: Some(cwd),
            ..Self::default()
        }
    }
}

/// A fully resolved repository location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryLocation {
    /// The metadata root.
    pub gitdir: PathBuf,
    /// The worktree root; `None` iff `bare`.
    pub worktree: Option<PathBuf>,
    /// Whether the repository is bare.
    pub bare: bool,
}

/// The subject of a destructive operation: a raw revision, or a
/// [`Reference`] provider whose `Commit` fact gates the operation.
pub enum OpTarget {
    /// A revision string, used as the subject commit directly.
    Rev(String),
    /// A reference provider; its resolved commit becomes the subject.
    Reference(Reference),
}

impl From<&str> for OpTarget {
    fn from(rev: &str) -> Self {
        Self::Rev(rev.to_string())
    }
}

impl From<String> for OpTarget {
    fn from(rev: String) -> Self {
        Self::Rev(rev)
    }
}

impl From<Reference> for OpTarget {
    fn from(reference: Reference) -> Self {
        Self::Reference(reference)
    }
}

/// Handle on an enqueued destructive operation.
pub struct Operation {
    bus: FactBus,
}

impl Operation {
    /// The operation's fact bus (`Done` / `Error`).
    pub fn bus(&self) -> &FactBus {
        &self.bus
    }

    /// Wait for completion: `Ok` once the operation ran, or the first
    /// error from the operation, its subject, or location resolution.
    pub async fn wait(&self) -> Result<(), GitError> {
        self.bus.first_or_error(FactName::Done).await.map(|_| ())
    }
}

/// Thin facade over one fact bus and one operation queue.
///
/// Dropping the facade does not cancel in-flight work; providers hold
/// their own bus clones.
pub struct Repository {
    bus: FactBus,
    queue: OpQueue,
    runner: Arc<dyn CommandRunner>,
}

impl Repository {
    /// Start location discovery with the production process runner.
    ///
    /// Must be called within a Tokio runtime; discovery and all provider
    /// exchanges run as spawned tasks.
    pub fn open(options: impl Into<RepoOptions>) -> Self {
        Self::with_runner(options, Arc::new(ProcessRunner::new()))
    }

    /// Start location discovery with an injected command runner.
    pub fn with_runner(
        options: impl Into<RepoOptions>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let options = options.into();
        let bus = FactBus::new();
        let queue = OpQueue::new(options.max_shared.unwrap_or(DEFAULT_MAX_SHARED));

        debug!(?options, "opening repository");
        resolver::spawn(bus.clone(), options, runner.clone());

        Self { bus, queue, runner }
    }

    /// The repository's fact bus (`GitDir`, `Worktree`, `Bare`, `Error`).
    pub fn bus(&self) -> &FactBus {
        &self.bus
    }

    /// The repository's operation queue. The shared class is available to
    /// callers batching their own work against this repository.
    pub fn ops(&self) -> &OpQueue {
        &self.queue
    }

    /// Wait until the location facts are fully resolved.
    pub async fn resolved(&self) -> Result<RepositoryLocation, GitError> {
        let gitdir = match self.bus.first_or_error(FactName::GitDir).await? {
            FactValue::Dir(dir) => dir,
            _ => return Err(GitError::Interrupted),
        };
        let bare = match self.bus.first_or_error(FactName::Bare).await? {
            FactValue::Flag(flag) => flag,
            _ => return Err(GitError::Interrupted),
        };
        let worktree = if bare {
            None
        } else {
            match self.bus.first_or_error(FactName::Worktree).await? {
                FactValue::Dir(dir) => Some(dir),
                _ => return Err(GitError::Interrupted),
            }
        };
        Ok(RepositoryLocation {
            gitdir,
            worktree,
            bare,
        })
    }

    /// Feed a provider bus from the repository bus: the root location once
    /// known, and any resolution error.
    fn attach(&self, provider_bus: &FactBus) {
        self.bus
            .forward_once(&[FactName::GitDir, FactName::Error], provider_bus);
    }

    /// The repository's local configuration.
    pub fn config(&self) -> Config {
        let provider = Config::spawn(
            ConfigOptions {
                scope: ConfigScope::Local,
                gitdir: None,
            },
            self.runner.clone(),
        );
        self.attach(provider.bus());
        provider
    }

    /// Resolve `HEAD`.
    pub fn head(&self) -> Reference {
        self.reference("HEAD")
    }

    /// Resolve a single revision name to its commit.
    pub fn reference(&self, options: impl Into<ReferenceOptions>) -> Reference {
        let provider = Reference::spawn(options, self.runner.clone());
        self.attach(provider.bus());
        provider
    }

    /// The repository's references, optionally path-filtered.
    pub fn refs(&self, options: impl Into<RefsOptions>) -> Refs {
        let provider = Refs::spawn(options, self.runner.clone());
        self.attach(provider.bus());
        provider
    }

    /// The repository's tags, names rebased below `refs/tags/`.
    pub fn tags(&self) -> Refs {
        self.refs("refs/tags")
    }

    /// The repository's branches, names rebased below `refs/heads/`.
    pub fn heads(&self) -> Refs {
        self.refs("refs/heads")
    }

    /// The repository's tags parsed as semantic versions, filtered by a
    /// range expression.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::Parse`] for an invalid range.
    pub fn versions(&self, range: &str) -> Result<Versions, GitError> {
        Ok(self.versions_with(VersionsOptions::range(range)?))
    }

    /// The repository's versions with an explicit options record.
    pub fn versions_with(&self, options: VersionsOptions) -> Versions {
        let provider = Versions::spawn(options, self.runner.clone());
        self.attach(provider.bus());
        provider
    }

    /// The highest version matching a range, in the same terminal shape
    /// as a direct reference lookup.
    pub async fn latest(&self, range: &str) -> Result<Option<RefFact>, GitError> {
        self.versions(range)?.latest().await
    }

    /// The submodule paths declared at the given revision.
    pub fn submodules(&self, rev: &str) -> Submodules {
        self.submodules_with(SubmodulesOptions {
            commit: Some(rev.to_string()),
            ..SubmodulesOptions::default()
        })
    }

    /// Submodules with an explicit options record.
    pub fn submodules_with(&self, options: SubmodulesOptions) -> Submodules {
        let provider = Submodules::spawn(options, self.runner.clone());
        self.attach(provider.bus());
        provider
    }

    /// Check out the target revision in the worktree.
    pub fn checkout(&self, target: impl Into<OpTarget>, options: GitOptions) -> Operation {
        self.operation(target.into(), move |git, commit| async move {
            git.checkout(options, &commit).await
        })
    }

    /// Create a tag pointing at the target revision.
    pub fn tag(
        &self,
        name: &str,
        target: impl Into<OpTarget>,
        options: GitOptions,
    ) -> Operation {
        let name = name.to_string();
        self.operation(target.into(), move |git, commit| async move {
            git.tag(options, &name, &commit).await
        })
    }

    /// Create a branch pointing at the target revision.
    pub fn branch(
        &self,
        name: &str,
        target: impl Into<OpTarget>,
        options: GitOptions,
    ) -> Operation {
        let name = name.to_string();
        self.operation(target.into(), move |git, commit| async move {
            git.branch(options, &name, &commit).await
        })
    }

    /// Gate `run` on the `GitDir`+`Worktree`+`Commit` aggregation, then
    /// execute it under an exclusive permit.
    fn operation<F, Fut>(&self, target: OpTarget, run: F) -> Operation
    where
        F: FnOnce(Git, String) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<ExecOutput, GitError>> + Send + 'static,
    {
        let op_bus = FactBus::new();
        self.bus.forward_once(
            &[FactName::GitDir, FactName::Worktree, FactName::Error],
            &op_bus,
        );

        match target {
            OpTarget::Rev(rev) => op_bus.publish(FactName::Commit, FactValue::Rev(rev)),
            OpTarget::Reference(reference) => {
                reference
                    .bus()
                    .forward_once(&[FactName::Commit, FactName::Error], &op_bus);
            }
        }

        let gate = op_bus.aggregate(&[FactName::GitDir, FactName::Worktree, FactName::Commit]);
        let queue = self.queue.clone();
        let runner = self.runner.clone();
        let bus = op_bus.clone();

        tokio::spawn(async move {
            let Some(values) = gate.wait().await else {
                return;
            };
            let mut values = values.into_iter();
            let (Some(gitdir), Some(worktree), Some(commit)) = (
                values.next().and_then(FactValue::into_dir),
                values.next().and_then(FactValue::into_dir),
                values.next().and_then(FactValue::into_rev),
            ) else {
                bus.publish(FactName::Error, FactValue::Error(GitError::Interrupted));
                return;
            };

            let git = Git::new(runner).with_gitdir(gitdir).with_worktree(worktree);
            let result = queue.exclusive(run(git, commit)).await;

            match result {
                Ok(_) => bus.publish(FactName::Done, FactValue::Unit),
                Err(err) => {
                    debug!(error = %err, "operation failed");
                    bus.publish(FactName::Error, FactValue::Error(err));
                }
            }
        });

        Operation { bus: op_bus }
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("bus", &self.bus)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
