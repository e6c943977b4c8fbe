//! gitfacts - Lazily resolved, asynchronously published Git repository facts
//!
//! gitfacts exposes repository metadata (location, configuration, references,
//! semantic versions, submodules) as facts that resolve lazily and publish
//! asynchronously. A caller may ask for the current tags before the
//! repository's root has even been located; the request still resolves
//! correctly once discovery completes, with no busy-waiting and no duplicate
//! work.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`bus`] - Fact bus: publish/subscribe with replay, aggregation, forwarding
//! - [`core`] - Strong domain types (object ids, terminal fact shapes)
//! - [`git`] - Single doorway to the external git executable
//! - [`sched`] - Exclusive/shared operation scheduler
//! - [`providers`] - Config, reference, refs, versions, submodules
//! - [`repo`] - Location resolver and the `Repository` facade
//!
//! # Correctness Invariants
//!
//! gitfacts maintains the following invariants:
//!
//! 1. A fact resolves at most once per generation; late subscribers replay
//!    the latest generation asynchronously, never synchronously
//! 2. Aggregations combine first-occurrence payloads in listed order and
//!    fire exactly once
//! 3. Destructive operations are serialized through the exclusive class of
//!    the operation scheduler
//! 4. All process execution flows through an injected [`git::CommandRunner`]
//!
//! # Example
//!
//! ```ignore
//! use gitfacts::Repository;
//!
//! # async fn example() -> Result<(), gitfacts::GitError> {
//! // Discovery starts immediately; the versions request attaches before
//! // the repository root is known and resolves once it is.
//! let repo = Repository::open(".");
//! let versions = repo.versions("1.x")?.wait().await?;
//!
//! for (version, commit) in &versions {
//!     println!("{version} -> {commit}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod core;
pub mod git;
pub mod providers;
pub mod repo;
pub mod sched;

pub use bus::{FactBus, FactName, FactStream, FactValue};
pub use git::{CommandRunner, ExecOutput, Git, GitError, MockRunner, ProcessRunner};
pub use repo::{RepoOptions, Repository, RepositoryLocation};
pub use sched::OpQueue;
