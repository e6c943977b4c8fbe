//! bus
//!
//! Fact bus: publish/subscribe with replay, aggregation, and forwarding.
//!
//! # Architecture
//!
//! A [`FactBus`] is a small table keyed by [`FactName`]. Publishing records
//! the payload as the latest *generation* for that name and hands it to
//! every attached subscriber channel; subscriber code observes it on a
//! later poll, never inside the publishing call. Subscribing after a fact
//! has published replays the recorded generation, also strictly after the
//! subscribing call returns. This decouples "a fact exists" from "who asked
//! first": producers start work immediately and lazily, consumers attach at
//! arbitrary times without races.
//!
//! Coordination across facts uses exactly two idioms:
//!
//! - [`FactBus::aggregate`] resolves once every listed name has published,
//!   with first-occurrence payloads in listed order
//! - [`FactBus::forward`] / [`FactBus::forward_once`] re-publish facts from
//!   one bus onto another
//!
//! # Invariants
//!
//! - No synchronous re-entrant delivery: a subscriber is never invoked
//!   within `publish` or within its own subscribing call
//! - An aggregation fires exactly once, with first-seen payloads only
//! - The generation table is mutated only under the bus's own lock
//!
//! There is no timeout or cancellation primitive: a fact that never
//! publishes leaves waiting subscriptions pending indefinitely. Callers
//! needing deadlines wrap waits in `tokio::time::timeout`.
//!
//! # Example
//!
//! ```
//! use std::path::PathBuf;
//! use gitfacts::bus::{FactBus, FactName, FactValue};
//!
//! # async fn example() {
//! let bus = FactBus::new();
//!
//! // Attach before the fact exists...
//! let pending = bus.first(FactName::GitDir);
//!
//! bus.publish(FactName::GitDir, FactValue::Dir(PathBuf::from("/repo/.git")));
//!
//! // ...or after; both observe the same generation.
//! let replayed = bus.first(FactName::GitDir);
//!
//! assert_eq!(pending.await, replayed.await);
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use crate::core::entities::{ConfigMap, RefSet, SubmoduleSet, VersionSet};
use crate::core::types::RefFact;
use crate::git::GitError;

/// The closed set of fact names used across the crate.
///
/// Names are bus-local conventions: `Entry` carries config entries on a
/// config provider's bus and reference entries on a refs provider's bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactName {
    /// The metadata root directory.
    GitDir,
    /// An indirection marker file standing in for the metadata root.
    GitFile,
    /// The worktree root directory.
    Worktree,
    /// Whether the repository is bare.
    Bare,
    /// The subject commit of an operation or reference.
    Commit,
    /// One incremental record parsed from a protocol exchange.
    Entry,
    /// Terminal fact of the config provider.
    Config,
    /// Terminal fact of the single-reference provider.
    Reference,
    /// Terminal fact of the refs provider.
    Refs,
    /// Terminal fact of the versions provider.
    Versions,
    /// Terminal fact of the submodules provider.
    Submodules,
    /// Terminal fact of a destructive operation.
    Done,
    /// A failure surfaced by the bus's owning component.
    Error,
}

impl std::fmt::Display for FactName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GitDir => "gitdir",
            Self::GitFile => "gitfile",
            Self::Worktree => "worktree",
            Self::Bare => "bare",
            Self::Commit => "commit",
            Self::Entry => "entry",
            Self::Config => "config",
            Self::Reference => "reference",
            Self::Refs => "refs",
            Self::Versions => "versions",
            Self::Submodules => "submodules",
            Self::Done => "done",
            Self::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// A fact payload.
///
/// The variants cover every payload shape published in the crate; consumers
/// pattern-match or use the `into_*` accessors.
#[derive(Debug, Clone, PartialEq)]
pub enum FactValue {
    /// A directory or file path (`GitDir`, `GitFile`, `Worktree`).
    Dir(PathBuf),
    /// A boolean fact (`Bare`).
    Flag(bool),
    /// A revision, possibly symbolic (`Commit`).
    Rev(String),
    /// A parsed config record.
    ConfigEntry { key: String, value: String },
    /// A parsed reference record.
    RefEntry { name: String, commit: crate::core::types::Oid },
    /// A parsed and admitted version record.
    VersionEntry {
        version: semver::Version,
        commit: crate::core::types::Oid,
    },
    /// A parsed submodule path record.
    PathEntry(PathBuf),
    /// Complete configuration entity.
    Config(ConfigMap),
    /// Resolved reference entity.
    Reference(RefFact),
    /// Complete reference-set entity.
    Refs(RefSet),
    /// Complete version-set entity.
    Versions(VersionSet),
    /// Complete submodule-set entity.
    Submodules(SubmoduleSet),
    /// Completion marker with no payload.
    Unit,
    /// A surfaced failure.
    Error(GitError),
}

impl FactValue {
    /// Extract a path payload.
    pub fn into_dir(self) -> Option<PathBuf> {
        match self {
            Self::Dir(path) => Some(path),
            _ => None,
        }
    }

    /// Extract a boolean payload.
    pub fn into_flag(self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(flag),
            _ => None,
        }
    }

    /// Extract a revision payload.
    pub fn into_rev(self) -> Option<String> {
        match self {
            Self::Rev(rev) => Some(rev),
            _ => None,
        }
    }

    /// Extract an error payload.
    pub fn into_error(self) -> Option<GitError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// A subscription attached to one fact name.
enum Subscriber {
    Persistent(mpsc::UnboundedSender<FactValue>),
    Once(oneshot::Sender<FactValue>),
}

#[derive(Default)]
struct BusState {
    latest: HashMap<FactName, FactValue>,
    subscribers: HashMap<FactName, Vec<Subscriber>>,
}

impl BusState {
    /// Register a one-shot subscription, replaying the latest generation if
    /// one exists.
    fn register_once(&mut self, name: FactName) -> oneshot::Receiver<FactValue> {
        let (tx, rx) = oneshot::channel();
        if let Some(latest) = self.latest.get(&name) {
            let _ = tx.send(latest.clone());
        } else {
            self.subscribers.entry(name).or_default().push(Subscriber::Once(tx));
        }
        rx
    }
}

/// Name-keyed publish/subscribe with generation replay.
///
/// Cheap to clone; clones share the same table.
#[derive(Clone, Default)]
pub struct FactBus {
    inner: Arc<Mutex<BusState>>,
}

impl FactBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` as the latest generation for `name` and hand it to
    /// every attached subscriber. Subscriber code observes the value on a
    /// later poll of its stream or future, never inside this call.
    pub fn publish(&self, name: FactName, value: FactValue) {
        let mut state = self.inner.lock().expect("bus lock");
        trace!(fact = %name, "publish");
        state.latest.insert(name, value.clone());

        if let Some(subs) = state.subscribers.get_mut(&name) {
            let drained = std::mem::take(subs);
            for sub in drained {
                match sub {
                    Subscriber::Persistent(tx) => {
                        // A closed channel means the stream was dropped;
                        // detach it.
                        if tx.send(value.clone()).is_ok() {
                            subs.push(Subscriber::Persistent(tx));
                        }
                    }
                    Subscriber::Once(tx) => {
                        let _ = tx.send(value.clone());
                    }
                }
            }
        }
    }

    /// Persistent subscription. If `name` already has a recorded
    /// generation, the stream yields it first, then future generations.
    pub fn subscribe(&self, name: FactName) -> FactStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.lock().expect("bus lock");
        if let Some(latest) = state.latest.get(&name) {
            trace!(fact = %name, "replay scheduled");
            let _ = tx.send(latest.clone());
        }
        state
            .subscribers
            .entry(name)
            .or_default()
            .push(Subscriber::Persistent(tx));
        FactStream { rx }
    }

    /// One-shot subscription: resolves with the first generation observed
    /// after attachment (replay counts), then detaches.
    ///
    /// Resolves to `None` only if the bus is dropped before the fact ever
    /// publishes.
    pub fn first(&self, name: FactName) -> FactOnce {
        let mut state = self.inner.lock().expect("bus lock");
        FactOnce {
            rx: state.register_once(name),
        }
    }

    /// Wait until every listed name has published at least once, then
    /// resolve exactly once with the first-occurrence payload of each name
    /// in listed order. Later re-publications do not re-trigger.
    ///
    /// If some name never publishes, the join never resolves.
    pub fn aggregate(&self, names: &[FactName]) -> FactJoin {
        let mut state = self.inner.lock().expect("bus lock");
        FactJoin {
            receivers: names.iter().map(|&name| state.register_once(name)).collect(),
        }
    }

    /// Wait for `name`, racing it against this bus's `Error` fact.
    ///
    /// Resolves with the fact's payload, or with the published error,
    /// whichever is observed first. Consumers that only wait on their
    /// desired fact hang forever when the producer fails; every terminal
    /// wait in this crate goes through here instead.
    pub async fn first_or_error(&self, name: FactName) -> Result<FactValue, GitError> {
        let value = self.first(name);
        let error = self.first(FactName::Error);
        tokio::select! {
            value = value => value.ok_or(GitError::Interrupted),
            error = error => match error {
                Some(FactValue::Error(err)) => Err(err),
                _ => Err(GitError::Interrupted),
            },
        }
    }

    /// Forward every publication of each listed name onto `to`, until this
    /// bus is dropped.
    pub fn forward(&self, names: &[FactName], to: &FactBus) {
        for &name in names {
            let mut stream = self.subscribe(name);
            let to = to.clone();
            tokio::spawn(async move {
                while let Some(value) = stream.next().await {
                    to.publish(name, value);
                }
            });
        }
    }

    /// Forward the first occurrence of each listed name onto `to`, then
    /// detach.
    pub fn forward_once(&self, names: &[FactName], to: &FactBus) {
        for &name in names {
            let once = self.first(name);
            let to = to.clone();
            tokio::spawn(async move {
                if let Some(value) = once.await {
                    to.publish(name, value);
                }
            });
        }
    }
}

impl std::fmt::Debug for FactBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock().expect("bus lock");
        f.debug_struct("FactBus")
            .field("facts", &state.latest.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Persistent fact subscription.
pub struct FactStream {
    rx: mpsc::UnboundedReceiver<FactValue>,
}

impl FactStream {
    /// The next generation, or `None` once the bus is dropped.
    pub async fn next(&mut self) -> Option<FactValue> {
        self.rx.recv().await
    }
}

/// One-shot fact subscription; resolves with the first observed generation.
pub struct FactOnce {
    rx: oneshot::Receiver<FactValue>,
}

impl Future for FactOnce {
    type Output = Option<FactValue>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}

/// Pending aggregation over several fact names.
pub struct FactJoin {
    receivers: Vec<oneshot::Receiver<FactValue>>,
}

impl FactJoin {
    /// Resolve once every name has published, with first-occurrence
    /// payloads in the order the names were listed.
    ///
    /// Returns `None` if the bus was dropped before some name published.
    pub async fn wait(self) -> Option<Vec<FactValue>> {
        let mut values = Vec::with_capacity(self.receivers.len());
        for rx in self.receivers {
            values.push(rx.await.ok()?);
        }
        Some(values)
    }
}
