//! providers::versions
//!
//! Version-set provider: the repository's tags parsed as semantic
//! versions.
//!
//! Builds on the refs provider with path `refs/tags`. Each admitted tag
//! name is parsed as a semantic version after stripping a leading `v`/`V`;
//! names that do not parse are silently dropped; a repository full of
//! non-version tags is not an error. An optional range keeps only
//! matching versions.
//!
//! Keys are the canonical `semver::Version` rendering (build metadata
//! joined with `.` after `+`), values are the bare commit ids. The
//! [`Versions::latest`] reducer returns the highest admitted version in
//! the same terminal shape as a direct reference lookup.

use std::path::PathBuf;
use std::sync::Arc;

use semver::{Version, VersionReq};
use tracing::debug;

use crate::bus::{FactBus, FactName, FactValue};
use crate::core::entities::VersionSet;
use crate::core::types::RefFact;
use crate::git::{CommandRunner, GitError};

use super::refs::{RefPredicate, Refs, RefsOptions};

/// Canonical options record for the versions provider.
#[derive(Clone, Default)]
pub struct VersionsOptions {
    /// Keep only versions matching this range.
    pub range: Option<VersionReq>,
    /// Keep only tag names the predicate admits, before version parsing.
    pub predicate: Option<RefPredicate>,
    /// Explicit metadata root; when absent the provider waits for
    /// `GitDir` on its bus.
    pub gitdir: Option<PathBuf>,
}

impl std::fmt::Debug for VersionsOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionsOptions")
            .field("range", &self.range)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .field("gitdir", &self.gitdir)
            .finish()
    }
}

impl VersionsOptions {
    /// Parse a range expression (e.g. `"0.x"`, `">=1.2, <2"`) into an
    /// options record.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::Parse`] for an invalid range.
    pub fn range(range: &str) -> Result<Self, GitError> {
        let range = VersionReq::parse(range).map_err(|err| GitError::Parse {
            what: "semver range",
            input: range.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            range: Some(range),
            ..Self::default()
        })
    }
}

impl From<VersionReq> for VersionsOptions {
    fn from(range: VersionReq) -> Self {
        Self {
            range: Some(range),
            ..Self::default()
        }
    }
}

/// Parse a tag name as a semantic version, tolerating a leading `v`/`V`.
/// The prefix never appears in version keys.
fn parse_tag(tag: &str) -> Option<Version> {
    let bare = tag
        .strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag);
    Version::parse(bare).ok()
}

/// Version-set fact provider.
///
/// Publishes one `Entry` fact per admitted version and a terminal
/// `Versions` fact carrying the assembled [`VersionSet`].
pub struct Versions {
    bus: FactBus,
}

impl Versions {
    /// Start the provider.
    pub fn spawn(options: impl Into<VersionsOptions>, runner: Arc<dyn CommandRunner>) -> Self {
        let options = options.into();
        let bus = FactBus::new();

        if let Some(gitdir) = &options.gitdir {
            bus.publish(FactName::GitDir, FactValue::Dir(gitdir.clone()));
        }

        // The tag listing itself is the refs provider's job; this provider
        // only parses and ranks.
        let tags = Refs::spawn(
            RefsOptions {
                path: Some("refs/tags".to_string()),
                predicate: options.predicate.clone(),
                gitdir: None,
            },
            runner,
        );
        bus.forward_once(&[FactName::GitDir], tags.bus());

        let task_bus = bus.clone();
        tokio::spawn(async move {
            match load(&task_bus, &options, &tags).await {
                Ok(set) => task_bus.publish(FactName::Versions, FactValue::Versions(set)),
                Err(err) => {
                    debug!(error = %err, "versions exchange failed");
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

    /// Wait for the terminal fact: the assembled set, or the first error.
    pub async fn wait(&self) -> Result<VersionSet, GitError> {
        match self.bus.first_or_error(FactName::Versions).await? {
            FactValue::Versions(set) => Ok(set),
            _ => Err(GitError::Interrupted),
        }
    }

    /// Reduce the set to its highest version, in the same terminal shape
    /// as a direct reference lookup. `None` when no version was admitted.
    pub async fn latest(&self) -> Result<Option<RefFact>, GitError> {
        let set = self.wait().await?;
        Ok(set.iter().next_back().map(|(version, commit)| RefFact {
            name: version.to_string(),
            commit: commit.clone(),
        }))
    }
}

async fn load(
    bus: &FactBus,
    options: &VersionsOptions,
    tags: &Refs,
) -> Result<VersionSet, GitError> {
    let names = tags.wait().await?;

    let mut set = VersionSet::new();
    for (tag, commit) in names {
        let Some(version) = parse_tag(&tag) else {
            continue;
        };
        if let Some(range) = &options.range {
            if !range.matches(&version) {
                continue;
            }
        }
        bus.publish(
            FactName::Entry,
            FactValue::VersionEntry {
                version: version.clone(),
                commit: commit.clone(),
            },
        );
        set.insert(version, commit);
    }

    debug!(versions = set.len(), "version set assembled");
    Ok(set)
}
