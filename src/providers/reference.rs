//! providers::reference
//!
//! Single-reference provider: resolves one revision name to a commit id
//! via `git rev-parse`, publishing a `Commit` fact and a terminal
//! [`RefFact`]. An explicitly supplied commit short-circuits the exchange.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::bus::{FactBus, FactName, FactValue};
use crate::core::types::{Oid, RefFact};
use crate::git::{CommandRunner, Git, GitError};

/// Canonical options record for the reference provider.
#[derive(Debug, Clone)]
pub struct ReferenceOptions {
    /// The revision name to resolve.
    pub name: String,
    /// A known commit id; when present, no exchange is issued.
    pub commit: Option<Oid>,
    /// Explicit metadata root; when absent the provider waits for
    /// `GitDir` on its bus.
    pub gitdir: Option<PathBuf>,
}

impl Default for ReferenceOptions {
    fn default() -> Self {
        Self {
            name: "HEAD".to_string(),
            commit: None,
            gitdir: None,
        }
    }
}

impl From<&str> for ReferenceOptions {
    fn from(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl From<String> for ReferenceOptions {
    fn from(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }
}

/// Single-reference fact provider.
pub struct Reference {
    bus: FactBus,
    name: String,
}

impl Reference {
    /// Start the provider.
    pub fn spawn(options: impl Into<ReferenceOptions>, runner: Arc<dyn CommandRunner>) -> Self {
        let options = options.into();
        let bus = FactBus::new();

        if let Some(gitdir) = &options.gitdir {
            bus.publish(FactName::GitDir, FactValue::Dir(gitdir.clone()));
        }

        let name = options.name.clone();
        let task_bus = bus.clone();
        tokio::spawn(async move {
            match resolve(&task_bus, &options, runner).await {
                Ok(fact) => {
                    task_bus.publish(FactName::Commit, FactValue::Rev(fact.commit.to_string()));
                    task_bus.publish(FactName::Reference, FactValue::Reference(fact));
                }
                Err(err) => {
                    debug!(error = %err, "reference resolution failed");
                    task_bus.publish(FactName::Error, FactValue::Error(err));
                }
            }
        });

        Self { bus, name }
    }

    /// The revision name this provider resolves.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The provider's fact bus.
    pub fn bus(&self) -> &FactBus {
        &self.bus
    }

    /// Wait for the terminal fact.
    pub async fn wait(&self) -> Result<RefFact, GitError> {
        match self.bus.first_or_error(FactName::Reference).await? {
            FactValue::Reference(fact) => Ok(fact),
            _ => Err(GitError::Interrupted),
        }
    }
}

async fn resolve(
    bus: &FactBus,
    options: &ReferenceOptions,
    runner: Arc<dyn CommandRunner>,
) -> Result<RefFact, GitError> {
    if let Some(commit) = &options.commit {
        return Ok(RefFact {
            name: options.name.clone(),
            commit: commit.clone(),
        });
    }

    let gitdir = match bus.first(FactName::GitDir).await {
        Some(FactValue::Dir(dir)) => dir,
        _ => return Err(GitError::Interrupted),
    };

    let git = Git::new(runner).with_gitdir(gitdir);
    let commit = git.rev_parse(&options.name).await?;

    Ok(RefFact {
        name: options.name.clone(),
        commit,
    })
}
