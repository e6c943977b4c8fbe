//! repo::resolver
//!
//! Location resolution state machine.
//!
//! Starting from an explicit hint or a starting directory, the resolver
//! walks ancestor directories looking for one of two signatures, in
//! order:
//!
//! 1. **Bare signature**: a `refs/` directory and a `HEAD` file as direct
//!    children; the candidate itself is the metadata root
//! 2. **Worktree marker**: a `.git` entry. A directory is the metadata
//!    root; a regular file must contain `gitdir: <path>` and indirects to
//!    a root elsewhere (submodules), resolved relative to the marker's
//!    own directory
//!
//! Reaching the filesystem root without a match fails with `NotFound`.
//!
//! Once a root is found the `GitDir` fact publishes immediately:
//! providers keyed on it alone start their exchanges while the resolver
//! consults the root's local configuration for an alternate worktree
//! (`core.worktree`, relative to the root) and a bare override
//! (`core.bare`). The `Worktree` and `Bare` facts publish only after that
//! disambiguation, in that order, so nothing may assume they are set when
//! `GitDir` arrives.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, trace};

use crate::bus::{FactBus, FactName, FactValue};
use crate::git::{CommandRunner, GitError};
use crate::providers::config::{Config, ConfigOptions, ConfigScope};

use super::RepoOptions;

/// Resolution progress. The walk advances through these states until it
/// terminates in `Resolved` or `Failed`.
#[derive(Debug)]
enum ResolveState {
    /// Probing a candidate directory for the two signatures.
    ProbingAncestors(PathBuf),
    /// The candidate carries `refs/` and `HEAD` directly.
    FoundBareSignature(PathBuf),
    /// The candidate carries a `.git` entry.
    FoundWorktreeMarker { worktree: PathBuf, marker: PathBuf },
    /// The marker is a regular file pointing at a root elsewhere.
    ResolvingIndirection { worktree: PathBuf, marker: PathBuf },
    /// Terminal success.
    Resolved(Discovery),
    /// Terminal failure.
    Failed(GitError),
}

/// What the walk found, before configuration disambiguates worktree and
/// bareness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Discovery {
    pub gitdir: PathBuf,
    pub worktree: Option<PathBuf>,
    /// The indirection marker file, when one was followed.
    pub marker: Option<PathBuf>,
}

/// Spawn the resolver against the given bus. Failures publish an `Error`
/// fact; success publishes `GitDir`, then `Worktree` (unless bare), then
/// `Bare`.
pub(crate) fn spawn(bus: FactBus, options: RepoOptions, runner: Arc<dyn CommandRunner>) {
    tokio::spawn(async move {
        if let Err(err) = resolve(&bus, options, runner).await {
            debug!(error = %err, "location resolution failed");
            bus.publish(FactName::Error, FactValue::Error(err));
        }
    });
}

async fn resolve(
    bus: &FactBus,
    options: RepoOptions,
    runner: Arc<dyn CommandRunner>,
) -> Result<(), GitError> {
    let discovery = discover(&options).await?;
    debug!(gitdir = %discovery.gitdir.display(), "metadata root located");

    if let Some(marker) = &discovery.marker {
        bus.publish(FactName::GitFile, FactValue::Dir(marker.clone()));
    }
    bus.publish(FactName::GitDir, FactValue::Dir(discovery.gitdir.clone()));

    // Disambiguate worktree/bareness from the root's own configuration.
    // Dependent providers already run against the published gitdir.
    let config = Config::spawn(
        ConfigOptions {
            scope: ConfigScope::Local,
            gitdir: Some(discovery.gitdir.clone()),
        },
        runner,
    );
    let map = config.wait().await?;

    let worktree = map
        .get("core.worktree")
        .map(|rel| lexical_join(&discovery.gitdir, Path::new(rel)))
        .or(discovery.worktree);
    let bare = map.get_bool("core.bare").unwrap_or(worktree.is_none());

    if bare {
        bus.publish(FactName::Bare, FactValue::Flag(true));
    } else if let Some(worktree) = worktree {
        bus.publish(FactName::Worktree, FactValue::Dir(worktree));
        bus.publish(FactName::Bare, FactValue::Flag(false));
    } else {
        // core.bare=false with no worktree known: the worktree fact stays
        // unpublished and location-gated waits stay pending.
        bus.publish(FactName::Bare, FactValue::Flag(false));
    }
    Ok(())
}

/// Run the discovery state machine for the given hints.
async fn discover(options: &RepoOptions) -> Result<Discovery, GitError> {
    if let Some(gitdir) = &options.gitdir {
        return Ok(Discovery {
            gitdir: absolutize(gitdir)?,
            worktree: match &options.worktree {
                Some(worktree) => Some(absolutize(worktree)?),
                None => None,
            },
            marker: None,
        });
    }

    if let Some(worktree) = &options.worktree {
        let worktree = absolutize(worktree)?;
        let marker = worktree.join(".git");
        let meta = fs::metadata(&marker)
            .await
            .map_err(|err| GitError::io(&marker, err))?;
        let state = if meta.is_dir() {
            ResolveState::FoundWorktreeMarker { worktree, marker }
        } else {
            ResolveState::ResolvingIndirection { worktree, marker }
        };
        return run_machine(state).await;
    }

    let start = match &options.cwd {
        Some(cwd) => absolutize(cwd)?,
        None => std::env::current_dir().map_err(|err| GitError::io(".", err))?,
    };
    run_machine(ResolveState::ProbingAncestors(start)).await
}

/// Advance the state machine to a terminal state.
async fn run_machine(mut state: ResolveState) -> Result<Discovery, GitError> {
    let start = match &state {
        ResolveState::ProbingAncestors(dir) => dir.clone(),
        _ => PathBuf::new(),
    };

    loop {
        trace!(?state, "resolver step");
        state = match state {
            ResolveState::ProbingAncestors(dir) => {
                if is_bare_root(&dir).await {
                    ResolveState::FoundBareSignature(dir)
                } else {
                    let marker = dir.join(".git");
                    match fs::metadata(&marker).await {
                        Ok(_) => ResolveState::FoundWorktreeMarker {
                            worktree: dir,
                            marker,
                        },
                        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                            match dir.parent() {
                                Some(parent) => {
                                    ResolveState::ProbingAncestors(parent.to_path_buf())
                                }
                                None => ResolveState::Failed(GitError::NotFound {
                                    start: start.clone(),
                                }),
                            }
                        }
                        Err(err) => ResolveState::Failed(GitError::io(&marker, err)),
                    }
                }
            }

            ResolveState::FoundBareSignature(dir) => ResolveState::Resolved(Discovery {
                gitdir: dir,
                worktree: None,
                marker: None,
            }),

            ResolveState::FoundWorktreeMarker { worktree, marker } => {
                match fs::metadata(&marker).await {
                    Ok(meta) if meta.is_dir() => ResolveState::Resolved(Discovery {
                        gitdir: marker,
                        worktree: Some(worktree),
                        marker: None,
                    }),
                    Ok(_) => ResolveState::ResolvingIndirection { worktree, marker },
                    Err(err) => ResolveState::Failed(GitError::io(&marker, err)),
                }
            }

            ResolveState::ResolvingIndirection { worktree, marker } => {
                match read_marker(&marker).await {
                    Ok(gitdir) => ResolveState::Resolved(Discovery {
                        gitdir,
                        worktree: Some(worktree),
                        marker: Some(marker),
                    }),
                    Err(err) => ResolveState::Failed(err),
                }
            }

            ResolveState::Resolved(discovery) => return Ok(discovery),
            ResolveState::Failed(err) => return Err(err),
        };
    }
}

/// Bare signature: `refs/` directory and `HEAD` file as direct children.
async fn is_bare_root(dir: &Path) -> bool {
    let refs = fs::metadata(dir.join("refs")).await;
    let head = fs::metadata(dir.join("HEAD")).await;
    matches!((refs, head), (Ok(refs), Ok(head)) if refs.is_dir() && head.is_file())
}

/// Read an indirection marker: exactly `gitdir: <path>` with an optional
/// trailing newline. The path resolves relative to the marker's directory.
async fn read_marker(marker: &Path) -> Result<PathBuf, GitError> {
    let bytes = fs::read(marker)
        .await
        .map_err(|err| GitError::io(marker, err))?;
    let content = String::from_utf8_lossy(&bytes);

    let Some(rest) = content.strip_prefix("gitdir: ") else {
        return Err(GitError::Format {
            path: marker.to_path_buf(),
            content: content.into_owned(),
        });
    };
    let target = rest.strip_suffix('\n').unwrap_or(rest);
    if target.is_empty() {
        return Err(GitError::Format {
            path: marker.to_path_buf(),
            content: content.into_owned(),
        });
    }

    let base = marker.parent().unwrap_or_else(|| Path::new("."));
    Ok(lexical_join(base, Path::new(target)))
}

/// Absolutize a hint against the process working directory, without
/// touching the filesystem.
fn absolutize(path: &Path) -> Result<PathBuf, GitError> {
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    let cwd = std::env::current_dir().map_err(|err| GitError::io(path, err))?;
    Ok(lexical_join(&cwd, path))
}

/// Join `rel` onto `base` and collapse `.`/`..` components lexically.
/// Resolved locations compare by value, so `../modules/foo` must not
/// survive in published facts.
fn lexical_join(base: &Path, rel: &Path) -> PathBuf {
    if rel.is_absolute() {
        normalize(rel)
    } else {
        normalize(&base.join(rel))
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}
