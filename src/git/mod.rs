//! git
//!
//! Single interface for all exchanges with the external git executable.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to git. All protocol exchanges flow
//! through [`Git`], which encodes arguments and normalizes failures; actual
//! process execution lives behind the [`CommandRunner`] trait, injected at
//! construction. No other module spawns processes or builds git argument
//! lists directly.
//!
//! # Responsibilities
//!
//! - Flag/option encoding (`--name`, `--no-name`, `--name=value`)
//! - Persistent `-c key=value` overrides and `--git-dir=`/`--work-tree=`
//!   root hints
//! - Converting non-zero exits into [`GitError::Command`] with full context
//! - Typed exchange helpers (`rev-parse`, `show-ref`, `config --list`,
//!   `ls-tree`, `checkout`, `tag`, `branch`)
//!
//! # Modules
//!
//! - `interface`: the [`Git`] doorway and [`GitError`] taxonomy
//! - `runner`: the [`CommandRunner`] contract and [`ProcessRunner`]
//! - [`mock`]: deterministic [`MockRunner`] for testing

mod interface;
pub mod mock;
mod runner;

pub use interface::{Arg, Git, GitError, GitOptions, Opt};
pub use mock::MockRunner;
pub use runner::{CommandRunner, ExecOutput, ProcessRunner};
