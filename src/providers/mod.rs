//! providers
//!
//! Dependent fact providers: config, reference, refs, versions,
//! submodules.
//!
//! # Architecture
//!
//! Every provider follows the same shape: it *holds* a [`FactBus`] (never
//! inherits behavior from one), takes an injected
//! [`CommandRunner`](crate::git::CommandRunner), waits for the `GitDir`
//! fact on its own bus (plus `Commit` where the protocol needs one),
//! issues one external-command protocol exchange, publishes incremental
//! `Entry` facts per parsed record, and finishes with a terminal fact
//! carrying its structured entity, or an `Error` fact.
//!
//! Providers never see the repository facade; they depend only on the
//! abstract fact of root location. The facade feeds them by forwarding
//! facts from its own bus.
//!
//! Constructor inputs are tagged variants (`&str`, paths, explicit option
//! records) resolved once at the boundary into a canonical record;
//! internal logic only ever sees the canonical form.
//!
//! [`FactBus`]: crate::bus::FactBus

pub mod config;
pub mod reference;
pub mod refs;
pub mod submodules;
pub mod versions;

pub use config::{Config, ConfigOptions, ConfigScope};
pub use reference::{Reference, ReferenceOptions};
pub use refs::{RefPredicate, Refs, RefsOptions};
pub use submodules::{SubmoduleFilter, Submodules, SubmodulesOptions};
pub use versions::{Versions, VersionsOptions};
