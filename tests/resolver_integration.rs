//! Integration tests for location resolution.
//!
//! These tests build real directory layouts via tempfile (bare signature
//! directories, `.git` worktree markers, submodule indirection files) and
//! resolve them through the full `Repository` facade. Configuration
//! exchanges are answered by a mock runner so the tests are deterministic
//! and need no git binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use gitfacts::bus::{FactName, FactValue};
use gitfacts::git::MockRunner;
use gitfacts::{GitError, RepoOptions, Repository};

/// Test fixture building repository layouts by hand.
struct TestLayout {
    dir: TempDir,
}

impl TestLayout {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Lay down the bare signature: `refs/` directory plus `HEAD` file.
    fn make_bare(&self, at: &str) -> PathBuf {
        let root = self.path().join(at);
        std::fs::create_dir_all(root.join("refs")).unwrap();
        std::fs::write(root.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        root
    }

    /// Lay down a worktree with a `.git` directory.
    fn make_worktree(&self, at: &str) -> PathBuf {
        let root = self.path().join(at);
        std::fs::create_dir_all(root.join(".git")).unwrap();
        root
    }

    /// Lay down a `.git` marker file with the given content.
    fn make_marker(&self, at: &str, content: &str) -> PathBuf {
        let root = self.path().join(at);
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(".git"), content).unwrap();
        root
    }

    fn subdir(&self, at: &str) -> PathBuf {
        let dir = self.path().join(at);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}

/// A runner that answers local-config exchanges with the given listing.
fn config_runner(listing: &str) -> Arc<MockRunner> {
    Arc::new(MockRunner::new().stdout("config", listing))
}

#[tokio::test]
async fn bare_signature_resolves_without_worktree() {
    let layout = TestLayout::new();
    let root = layout.make_bare("store.git");

    let repo = Repository::with_runner(root.as_path(), config_runner("core.bare=true\n"));
    let location = repo.resolved().await.unwrap();

    assert_eq!(location.gitdir, root);
    assert_eq!(location.worktree, None);
    assert!(location.bare);
}

#[tokio::test]
async fn worktree_with_git_directory_resolves() {
    let layout = TestLayout::new();
    let root = layout.make_worktree("project");
    let nested = layout.subdir("project/src/deep");

    let repo = Repository::with_runner(nested.as_path(), config_runner("core.bare=false\n"));
    let location = repo.resolved().await.unwrap();

    assert_eq!(location.gitdir, root.join(".git"));
    assert_eq!(location.worktree, Some(root));
    assert!(!location.bare);
}

#[tokio::test]
async fn marker_file_indirects_to_module_store() {
    let layout = TestLayout::new();
    layout.subdir("parent/.git/modules/child");
    let child = layout.make_marker("parent/child", "gitdir: ../.git/modules/child\n");

    let repo = Repository::with_runner(child.as_path(), config_runner("core.bare=false\n"));
    let location = repo.resolved().await.unwrap();

    assert_eq!(
        location.gitdir,
        layout.path().join("parent/.git/modules/child")
    );
    assert_eq!(location.worktree, Some(child.clone()));

    // The marker itself is also published as a fact.
    let marker = repo.bus().first(FactName::GitFile).await.unwrap();
    assert_eq!(marker, FactValue::Dir(child.join(".git")));
}

#[tokio::test]
async fn malformed_marker_publishes_format_error_and_no_gitdir() {
    let layout = TestLayout::new();
    let broken = layout.make_marker("broken", "workdir: /somewhere\n");

    let repo = Repository::with_runner(broken.as_path(), config_runner(""));

    let err = repo.resolved().await.unwrap_err();
    assert!(matches!(err, GitError::Format { .. }));

    // The gitdir fact never published; only the error is recorded.
    let outcome = repo.bus().first_or_error(FactName::GitDir).await;
    assert!(matches!(outcome, Err(GitError::Format { .. })));
}

#[tokio::test]
async fn core_worktree_overrides_discovered_worktree() {
    let layout = TestLayout::new();
    let root = layout.make_bare("store.git");
    layout.subdir("checkout");

    let repo = Repository::with_runner(
        root.as_path(),
        config_runner("core.bare=false\ncore.worktree=../checkout\n"),
    );
    let location = repo.resolved().await.unwrap();

    assert_eq!(location.gitdir, root);
    assert_eq!(location.worktree, Some(layout.path().join("checkout")));
    assert!(!location.bare);
}

#[tokio::test]
async fn explicit_gitdir_hint_skips_discovery() {
    let layout = TestLayout::new();

    // No signatures on disk at all: hints are trusted as-is.
    let repo = Repository::with_runner(
        RepoOptions {
            gitdir: Some(layout.path().join("elsewhere.git")),
            ..RepoOptions::default()
        },
        config_runner("core.bare=true\n"),
    );
    let location = repo.resolved().await.unwrap();

    assert_eq!(location.gitdir, layout.path().join("elsewhere.git"));
    assert!(location.bare);
}

#[tokio::test]
async fn explicit_worktree_hint_probes_its_marker() {
    let layout = TestLayout::new();
    let root = layout.make_worktree("project");

    let repo = Repository::with_runner(
        RepoOptions {
            worktree: Some(root.clone()),
            ..RepoOptions::default()
        },
        config_runner("core.bare=false\n"),
    );
    let location = repo.resolved().await.unwrap();

    assert_eq!(location.gitdir, root.join(".git"));
    assert_eq!(location.worktree, Some(root));
}

#[tokio::test]
async fn provider_attached_before_resolution_still_resolves() {
    let layout = TestLayout::new();
    layout.make_worktree("project");
    let nested = layout.subdir("project/src");

    let runner = Arc::new(
        MockRunner::new()
            .stdout("config", "core.bare=false\n")
            .stdout(
                "show-ref",
                "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3 refs/tags/v1.0.0\n",
            ),
    );

    let repo = Repository::with_runner(nested.as_path(), runner);

    // Request tags before the root is known; the provider must still
    // resolve once discovery completes.
    let tags = repo.tags();
    let set = tags.wait().await.unwrap();

    assert_eq!(set.len(), 1);
    assert!(set.contains_key("v1.0.0"));
}

#[tokio::test]
async fn resolution_failure_propagates_to_attached_providers() {
    let layout = TestLayout::new();
    let broken = layout.make_marker("broken", "nonsense\n");

    let repo = Repository::with_runner(broken.as_path(), config_runner(""));

    let err = repo.tags().wait().await.unwrap_err();
    assert!(matches!(err, GitError::Format { .. }));
}
