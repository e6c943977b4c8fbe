//! providers::submodules
//!
//! Submodule-set provider: the relative paths declared in a repository's
//! `.gitmodules` manifest at a given commit.
//!
//! The exchange is two-step: `git ls-tree <commit>` locates the
//! `.gitmodules` blob, then `git config --blob=<sha> --list` is parsed for
//! `submodule.<name>.path=<value>` records. A repository without a
//! manifest yields an empty set, not an error. Gated on both the `GitDir`
//! and `Commit` facts via aggregation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::bus::{FactBus, FactName, FactValue};
use crate::core::entities::SubmoduleSet;
use crate::core::types::Oid;
use crate::git::{CommandRunner, Git, GitError};

/// Predicate over a declared submodule path.
pub type PathPredicate = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Which declared paths to admit.
#[derive(Clone, Default)]
pub enum SubmoduleFilter {
    /// Admit everything.
    #[default]
    All,
    /// Admit one exact path.
    Exact(PathBuf),
    /// Admit paths matching a glob pattern.
    Glob(glob::Pattern),
    /// Admit paths the predicate accepts.
    Predicate(PathPredicate),
}

impl SubmoduleFilter {
    fn admit(&self, path: &Path) -> bool {
        match self {
            Self::All => true,
            Self::Exact(exact) => path == exact,
            Self::Glob(pattern) => pattern.matches_path(path),
            Self::Predicate(predicate) => predicate(path),
        }
    }
}

impl std::fmt::Debug for SubmoduleFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::Exact(path) => f.debug_tuple("Exact").field(path).finish(),
            Self::Glob(pattern) => f.debug_tuple("Glob").field(&pattern.as_str()).finish(),
            Self::Predicate(_) => write!(f, "Predicate(<fn>)"),
        }
    }
}

/// Canonical options record for the submodules provider.
#[derive(Debug, Clone, Default)]
pub struct SubmodulesOptions {
    /// Which declared paths to admit.
    pub filter: SubmoduleFilter,
    /// The commit whose manifest to read; when absent the provider waits
    /// for a `Commit` fact on its bus.
    pub commit: Option<String>,
    /// Explicit metadata root; when absent the provider waits for
    /// `GitDir` on its bus.
    pub gitdir: Option<PathBuf>,
}

impl From<&str> for SubmodulesOptions {
    /// A string containing glob metacharacters is a pattern, anything
    /// else an exact path.
    fn from(s: &str) -> Self {
        let filter = if s.contains(['*', '?', '[', ']']) {
            match glob::Pattern::new(s) {
                Ok(pattern) => SubmoduleFilter::Glob(pattern),
                Err(_) => SubmoduleFilter::Exact(PathBuf::from(s)),
            }
        } else {
            SubmoduleFilter::Exact(PathBuf::from(s))
        };
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// Submodule-set fact provider.
///
/// Publishes one `Entry` fact per admitted path and a terminal
/// `Submodules` fact carrying the assembled [`SubmoduleSet`].
pub struct Submodules {
    bus: FactBus,
}

impl Submodules {
    /// Start the provider.
    pub fn spawn(options: impl Into<SubmodulesOptions>, runner: Arc<dyn CommandRunner>) -> Self {
        let options = options.into();
        let bus = FactBus::new();

        if let Some(gitdir) = &options.gitdir {
            bus.publish(FactName::GitDir, FactValue::Dir(gitdir.clone()));
        }
        if let Some(commit) = &options.commit {
            bus.publish(FactName::Commit, FactValue::Rev(commit.clone()));
        }

        let task_bus = bus.clone();
        tokio::spawn(async move {
            match load(&task_bus, &options, runner).await {
                Ok(set) => task_bus.publish(FactName::Submodules, FactValue::Submodules(set)),
                Err(err) => {
                    debug!(error = %err, "submodules exchange failed");
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
    pub async fn wait(&self) -> Result<SubmoduleSet, GitError> {
        match self.bus.first_or_error(FactName::Submodules).await? {
            FactValue::Submodules(set) => Ok(set),
            _ => Err(GitError::Interrupted),
        }
    }
}

/// Find the `.gitmodules` blob id in an `ls-tree` listing.
fn find_manifest_blob(listing: &str) -> Result<Option<Oid>, GitError> {
    for line in listing.lines() {
        let Some(rest) = line.strip_prefix("100644 blob ") else {
            continue;
        };
        let Some((sha, name)) = rest.split_once('\t') else {
            continue;
        };
        if name == ".gitmodules" {
            return Ok(Some(Oid::new(sha)?));
        }
    }
    Ok(None)
}

async fn load(
    bus: &FactBus,
    options: &SubmodulesOptions,
    runner: Arc<dyn CommandRunner>,
) -> Result<SubmoduleSet, GitError> {
    let Some(values) = bus
        .aggregate(&[FactName::GitDir, FactName::Commit])
        .wait()
        .await
    else {
        return Err(GitError::Interrupted);
    };
    let mut values = values.into_iter();
    let gitdir = values
        .next()
        .and_then(FactValue::into_dir)
        .ok_or(GitError::Interrupted)?;
    let commit = values
        .next()
        .and_then(FactValue::into_rev)
        .ok_or(GitError::Interrupted)?;

    let git = Git::new(runner).with_gitdir(gitdir);

    let tree = git.ls_tree(&commit).await?;
    let Some(blob) = find_manifest_blob(&tree)? else {
        // No manifest at this commit.
        debug!(%commit, "no .gitmodules manifest");
        return Ok(SubmoduleSet::new());
    };

    let manifest = git.config_blob(&blob).await?;

    let mut set = SubmoduleSet::new();
    for line in manifest.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let is_path_record = key
            .strip_prefix("submodule.")
            .is_some_and(|rest| rest.ends_with(".path") && rest.len() > ".path".len());
        if !is_path_record {
            continue;
        }

        let path = PathBuf::from(value);
        if !options.filter.admit(&path) {
            continue;
        }
        bus.publish(FactName::Entry, FactValue::PathEntry(path.clone()));
        set.insert(path);
    }

    debug!(submodules = set.len(), "submodule set assembled");
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockRunner;

    const BLOB: &str = "de9f2c7fd25e1b3afad3e85a0bd17d9b100db4b3";
    const TREE_SHA: &str = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";

    fn tree_listing() -> String {
        format!(
            "100644 blob {BLOB}\t.gitmodules\n\
             040000 tree {TREE_SHA}\tsrc\n"
        )
    }

    fn manifest() -> &'static str {
        "submodule.vendor.path=vendor/lib\n\
         submodule.vendor.url=../vendor\n\
         submodule.docs.path=docs/site\n"
    }

    fn spawn_with(options: SubmodulesOptions) -> Submodules {
        let runner = Arc::new(
            MockRunner::new()
                .stdout("ls-tree", &tree_listing())
                .stdout("config", manifest()),
        );
        let modules = Submodules::spawn(options, runner);
        modules
            .bus()
            .publish(FactName::GitDir, FactValue::Dir("/g".into()));
        modules
            .bus()
            .publish(FactName::Commit, FactValue::Rev("HEAD".into()));
        modules
    }

    #[tokio::test]
    async fn collects_declared_paths() {
        let modules = spawn_with(SubmodulesOptions::default());
        let set = modules.wait().await.unwrap();

        assert_eq!(set.len(), 2);
        assert!(set.contains(Path::new("vendor/lib")));
        assert!(set.contains(Path::new("docs/site")));
    }

    #[tokio::test]
    async fn glob_pattern_filters_paths() {
        let modules = spawn_with(SubmodulesOptions::from("vendor/*"));
        let set = modules.wait().await.unwrap();

        assert_eq!(set.len(), 1);
        assert!(set.contains(Path::new("vendor/lib")));
    }

    #[tokio::test]
    async fn exact_path_filter() {
        let modules = spawn_with(SubmodulesOptions::from("docs/site"));
        let set = modules.wait().await.unwrap();

        assert_eq!(set.len(), 1);
        assert!(set.contains(Path::new("docs/site")));
    }

    #[tokio::test]
    async fn missing_manifest_yields_empty_set() {
        let runner = Arc::new(MockRunner::new().stdout(
            "ls-tree",
            &format!("040000 tree {TREE_SHA}\tsrc\n"),
        ));
        let modules = Submodules::spawn(
            SubmodulesOptions {
                commit: Some("HEAD".to_string()),
                gitdir: Some("/g".into()),
                ..SubmodulesOptions::default()
            },
            runner,
        );

        let set = modules.wait().await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn waits_for_both_gitdir_and_commit() {
        let runner = Arc::new(
            MockRunner::new()
                .stdout("ls-tree", &tree_listing())
                .stdout("config", manifest()),
        );
        let modules = Submodules::spawn(SubmodulesOptions::default(), runner.clone());

        // Neither prerequisite has published; no exchange may run.
        tokio::task::yield_now().await;
        assert!(runner.calls().is_empty());

        modules
            .bus()
            .publish(FactName::Commit, FactValue::Rev("HEAD".into()));
        tokio::task::yield_now().await;
        assert!(runner.calls().is_empty());

        modules
            .bus()
            .publish(FactName::GitDir, FactValue::Dir("/g".into()));
        let set = modules.wait().await.unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn manifest_blob_detection() {
        assert_eq!(
            find_manifest_blob(&tree_listing()).unwrap(),
            Some(Oid::new(BLOB).unwrap())
        );
        assert_eq!(find_manifest_blob("").unwrap(), None);
        assert_eq!(
            find_manifest_blob(&format!("100644 blob {BLOB}\tREADME.md\n")).unwrap(),
            None
        );
    }
}
