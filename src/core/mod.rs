//! core
//!
//! Strong domain types shared across the crate.
//!
//! # Modules
//!
//! - [`types`]: validated object ids and terminal fact shapes
//! - [`entities`]: structured entities assembled by the fact providers

pub mod entities;
pub mod types;

pub use entities::{ConfigMap, RefSet, SubmoduleSet, VersionSet};
pub use types::{Oid, RefFact, TypeError};
