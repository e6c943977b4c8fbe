//! End-to-end tests for the repository facade.
//!
//! All exchanges are answered by a mock runner; the repository is given
//! explicit root hints so the scenarios exercise provider wiring, fact
//! replay, and operation gating rather than filesystem discovery.

use std::path::PathBuf;
use std::sync::Arc;

use gitfacts::bus::{FactName, FactValue};
use gitfacts::git::{GitOptions, MockRunner};
use gitfacts::{GitError, RepoOptions, Repository};

const SHA1: &str = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";
const SHA2: &str = "de9f2c7fd25e1b3afad3e85a0bd17d9b100db4b3";

/// Route crate diagnostics into the test harness; `RUST_LOG=trace` shows
/// fact publications.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A non-bare repository at `/repo` answered entirely by the mock.
fn repo_with(runner: MockRunner) -> (Repository, Arc<MockRunner>) {
    init_tracing();
    let runner = Arc::new(runner);
    let repo = Repository::with_runner(
        RepoOptions {
            gitdir: Some(PathBuf::from("/repo/.git")),
            worktree: Some(PathBuf::from("/repo")),
            ..RepoOptions::default()
        },
        runner.clone(),
    );
    (repo, runner)
}

fn plain_config() -> &'static str {
    "core.bare=false\n"
}

mod versions {
    use super::*;

    fn tag_listing() -> String {
        format!("{SHA1} refs/tags/v1.0.0\n{SHA2} refs/tags/v0.2.1\n")
    }

    #[tokio::test]
    async fn range_zero_x_selects_only_the_zero_series() {
        let (repo, _) = repo_with(
            MockRunner::new()
                .stdout("config", plain_config())
                .stdout("show-ref", &tag_listing()),
        );

        let set = repo.versions("0.x").unwrap().wait().await.unwrap();

        let entries: Vec<(String, String)> = set
            .iter()
            .map(|(v, c)| (v.to_string(), c.to_string()))
            .collect();
        assert_eq!(entries, vec![("0.2.1".to_string(), SHA2.to_string())]);
    }

    #[tokio::test]
    async fn latest_ranks_by_semantic_version_order() {
        let (repo, _) = repo_with(
            MockRunner::new()
                .stdout("config", plain_config())
                .stdout("show-ref", &tag_listing()),
        );

        let latest = repo.latest("*").await.unwrap().unwrap();
        assert_eq!(latest.name, "1.0.0");
        assert_eq!(latest.commit.as_str(), SHA1);

        let latest_zero = repo.latest("0.x").await.unwrap().unwrap();
        assert_eq!(latest_zero.name, "0.2.1");
        assert_eq!(latest_zero.commit.as_str(), SHA2);
    }
}

mod config {
    use super::*;

    #[tokio::test]
    async fn flat_key_and_nested_projection_agree() {
        let (repo, _) = repo_with(MockRunner::new().stdout(
            "config",
            "core.bare=false\nsubmodule.submodule.url=../elsewhere\n",
        ));

        let map = repo.config().wait().await.unwrap();

        assert_eq!(map.get("submodule.submodule.url"), Some("../elsewhere"));
        let nested = map.lookup(["submodule", "submodule", "url"]).unwrap();
        assert_eq!(nested.as_str(), Some("../elsewhere"));

        assert_eq!(map.get("core.bare"), Some("false"));
        assert_eq!(
            map.lookup(["core", "bare"]),
            Some(&serde_json::Value::Bool(false))
        );
    }
}

mod submodules {
    use super::*;
    use std::path::Path;

    #[tokio::test]
    async fn manifest_paths_resolve_through_the_facade() {
        // The blob-sensitive rule must come first: rules match in order.
        let (repo, _) = repo_with(
            MockRunner::new()
                .respond("config", |args| {
                    args.iter()
                        .any(|a| a.starts_with("--blob="))
                        .then(|| {
                            gitfacts::git::ExecOutput::success(
                                "submodule.vendor.path=vendor/lib\n",
                            )
                        })
                })
                .stdout("config", plain_config())
                .stdout(
                    "ls-tree",
                    &format!("100644 blob {SHA2}\t.gitmodules\n"),
                ),
        );

        let set = repo.submodules("HEAD").wait().await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains(Path::new("vendor/lib")));
    }
}

mod replay {
    use super::*;

    #[tokio::test]
    async fn late_fact_subscription_replays_the_same_payload() {
        let (repo, _) = repo_with(MockRunner::new().stdout("config", plain_config()));

        // First wait drives resolution to completion.
        let location = repo.resolved().await.unwrap();

        // A second, late wait observes identical facts by replay.
        let replayed = repo.resolved().await.unwrap();
        assert_eq!(location, replayed);

        let gitdir = repo.bus().first(FactName::GitDir).await.unwrap();
        assert_eq!(gitdir, FactValue::Dir(PathBuf::from("/repo/.git")));
    }
}

mod operations {
    use super::*;

    #[tokio::test]
    async fn checkout_waits_for_subject_commit() {
        let (repo, runner) = repo_with(
            MockRunner::new()
                .stdout("config", plain_config())
                .stdout("rev-parse", &format!("{SHA1}\n"))
                .stdout("checkout", ""),
        );

        let head = repo.head();
        repo.checkout(head, GitOptions::new().flag("quiet", true))
            .wait()
            .await
            .unwrap();

        let calls = runner.calls_for("checkout");
        assert_eq!(
            calls[0],
            vec![
                "--git-dir=/repo/.git",
                "--work-tree=/repo",
                "checkout",
                "--quiet",
                SHA1,
            ]
        );
    }

    #[tokio::test]
    async fn branch_and_tag_share_the_exclusive_queue() {
        let (repo, runner) = repo_with(
            MockRunner::new()
                .stdout("config", plain_config())
                .stdout("branch", "")
                .stdout("tag", ""),
        );

        let branch = repo.branch("feature", "HEAD", GitOptions::new());
        let tag = repo.tag("v9.9.9", "HEAD", GitOptions::new());

        branch.wait().await.unwrap();
        tag.wait().await.unwrap();

        assert_eq!(runner.calls_for("branch").len(), 1);
        assert_eq!(runner.calls_for("tag").len(), 1);
        assert_eq!(repo.ops().active(), 0);
    }

    #[tokio::test]
    async fn operation_error_includes_captured_output() {
        let (repo, _) = repo_with(
            MockRunner::new()
                .stdout("config", plain_config())
                .failure("checkout", 1, "error: pathspec 'nope' did not match\n"),
        );

        let err = repo
            .checkout("nope", GitOptions::new())
            .wait()
            .await
            .unwrap_err();

        match err {
            GitError::Command { stderr, args, .. } => {
                assert!(stderr.contains("pathspec"));
                assert!(args.contains(&"checkout".to_string()));
            }
            other => panic!("expected Command error, got {other}"),
        }
    }
}
