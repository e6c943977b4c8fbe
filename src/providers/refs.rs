//! providers::refs
//!
//! Reference-set provider: one `git show-ref` exchange, filtered into a
//! [`RefSet`].
//!
//! A path prefix rebases admitted names below it (`refs/tags/v1.0.0`
//! becomes `v1.0.0`); an optional predicate further filters the rebased
//! names. Both are resolved once at the options boundary.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::bus::{FactBus, FactName, FactValue};
use crate::core::entities::RefSet;
use crate::git::{CommandRunner, Git, GitError};

/// Predicate over a (possibly rebased) reference name.
pub type RefPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Canonical options record for the refs provider.
#[derive(Clone, Default)]
pub struct RefsOptions {
    /// Keep only references below this path, rebasing their names
    /// relative to it.
    pub path: Option<String>,
    /// Keep only rebased names the predicate admits.
    pub predicate: Option<RefPredicate>,
    /// Explicit metadata root; when absent the provider waits for
    /// `GitDir` on its bus.
    pub gitdir: Option<PathBuf>,
}

impl From<&str> for RefsOptions {
    fn from(path: &str) -> Self {
        Self {
            path: Some(path.to_string()),
            ..Self::default()
        }
    }
}

impl From<String> for RefsOptions {
    fn from(path: String) -> Self {
        Self {
            path: Some(path),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for RefsOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefsOptions")
            .field("path", &self.path)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .field("gitdir", &self.gitdir)
            .finish()
    }
}

impl RefsOptions {
    /// Apply the path and predicate filters to one reference path,
    /// returning the admitted (possibly rebased) name.
    fn admit(&self, ref_path: &str) -> Option<String> {
        let name = match &self.path {
            Some(path) => {
                let prefix: String = if path.ends_with('/') {
                    path.clone()
                } else {
                    format!("{path}/")
                };
                ref_path.strip_prefix(&prefix)?.to_string()
            }
            None => ref_path.to_string(),
        };

        match &self.predicate {
            Some(predicate) if !predicate(&name) => None,
            _ => Some(name),
        }
    }
}

/// Reference-set fact provider.
///
/// Publishes one `Entry` fact per admitted reference and a terminal
/// `Refs` fact carrying the assembled [`RefSet`].
pub struct Refs {
    bus: FactBus,
}

impl Refs {
    /// Start the provider.
    pub fn spawn(options: impl Into<RefsOptions>, runner: Arc<dyn CommandRunner>) -> Self {
        let options = options.into();
        let bus = FactBus::new();

        if let Some(gitdir) = &options.gitdir {
            bus.publish(FactName::GitDir, FactValue::Dir(gitdir.clone()));
        }

        let task_bus = bus.clone();
        tokio::spawn(async move {
            match load(&task_bus, &options, runner).await {
                Ok(set) => task_bus.publish(FactName::Refs, FactValue::Refs(set)),
                Err(err) => {
                    debug!(error = %err, "refs exchange failed");
                    task_bus.publish(FactName::Error, FactValue::Error(err));
                }
            }
        });

        Self { bus }
    }

    /// The provider's fact bus.
    pub fn bus(&self) -> &FactBus {
        &self.bus
    }

    /// Subscribe to the incremental `Entry` facts.
    pub fn entries(&self) -> crate::bus::FactStream {
        self.bus.subscribe(FactName::Entry)
    }

    /// Wait for the terminal fact: the assembled set, or the first error.
    pub async fn wait(&self) -> Result<RefSet, GitError> {
        match self.bus.first_or_error(FactName::Refs).await? {
            FactValue::Refs(set) => Ok(set),
            _ => Err(GitError::Interrupted),
        }
    }
}

async fn load(
    bus: &FactBus,
    options: &RefsOptions,
    runner: Arc<dyn CommandRunner>,
) -> Result<RefSet, GitError> {
    let gitdir = match bus.first(FactName::GitDir).await {
        Some(FactValue::Dir(dir)) => dir,
        _ => return Err(GitError::Interrupted),
    };

    let git = Git::new(runner).with_gitdir(gitdir);
    let listing = git.show_ref().await?;

    let mut set = RefSet::new();
    for (commit, ref_path) in listing {
        let Some(name) = options.admit(&ref_path) else {
            continue;
        };
        bus.publish(
            FactName::Entry,
            FactValue::RefEntry {
                name: name.clone(),
                commit: commit.clone(),
            },
        );
        set.insert(name, commit);
    }

    debug!(refs = set.len(), "reference listing assembled");
    Ok(set)
}
