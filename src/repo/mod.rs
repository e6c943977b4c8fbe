//! repo
//!
//! Location resolution and the repository facade.
//!
//! # Modules
//!
//! - `resolver`: the ancestor-walk state machine publishing the `GitDir`,
//!   `Worktree`, and `Bare` facts
//! - `repository`: the [`Repository`] facade owning one fact bus and one
//!   operation queue

mod resolver;
mod repository;

pub use repository::{
    OpTarget, Operation, RepoOptions, Repository, RepositoryLocation, DEFAULT_MAX_SHARED,
};
