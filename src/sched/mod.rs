//! sched
//!
//! Exclusive/shared operation scheduler.
//!
//! An [`OpQueue`] serializes operations against one logical resource. Every
//! entry carries a concurrency cap: `1` for the exclusive class, the
//! queue's configured maximum for the shared class. Dispatch only ever
//! inspects the **head** of the FIFO queue: the head starts when the
//! number of active operations is below its cap, otherwise dispatch stops
//! for this cycle. A blocked exclusive head therefore starves later
//! shared-eligible entries; that is a deliberate simplicity trade-off, not
//! a scheduling optimum.
//!
//! Permits release on drop; each release re-runs dispatch. The dispatch
//! loop is only ever entered under the queue lock, never concurrently with
//! itself.
//!
//! # Example
//!
//! ```
//! use gitfacts::sched::OpQueue;
//!
//! # async fn example() {
//! let queue = OpQueue::new(4);
//!
//! // At most one exclusive operation runs at a time; shared operations
//! // overlap up to the configured maximum.
//! let result = queue.exclusive(async { "done" }).await;
//! assert_eq!(result, "done");
//! # }
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::trace;

/// A queued waiter: granted when `active < cap` while at the head.
struct Waiter {
    cap: usize,
    tx: oneshot::Sender<()>,
}

struct QueueState {
    max_shared: usize,
    active: usize,
    queue: VecDeque<Waiter>,
}

impl QueueState {
    /// Start eligible entries from the head of the queue. Stops at the
    /// first entry whose cap would be exceeded.
    fn dispatch(&mut self) {
        while let Some(head) = self.queue.front() {
            if self.active >= head.cap {
                break;
            }
            let waiter = self.queue.pop_front().expect("head exists");
            self.active += 1;
            trace!(active = self.active, "operation started");
            if waiter.tx.send(()).is_err() {
                // Waiter gave up before being granted; release its slot.
                self.active -= 1;
            }
        }
    }
}

/// FIFO queue enforcing per-operation concurrency classes.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct OpQueue {
    inner: Arc<Mutex<QueueState>>,
}

impl OpQueue {
    /// Create a queue whose shared class admits up to `max_shared`
    /// concurrently active operations. The maximum is fixed for the
    /// queue's lifetime.
    pub fn new(max_shared: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueState {
                max_shared: max_shared.max(1),
                active: 0,
                queue: VecDeque::new(),
            })),
        }
    }

    /// Enqueue an exclusive waiter (cap 1). The returned future resolves
    /// to a permit once granted; the queue position is taken immediately,
    /// before the future is first polled.
    pub fn acquire_exclusive(&self) -> PermitFuture {
        self.acquire(1)
    }

    /// Enqueue a shared waiter (cap `max_shared`).
    pub fn acquire_shared(&self) -> PermitFuture {
        let cap = self.inner.lock().expect("queue lock").max_shared;
        self.acquire(cap)
    }

    fn acquire(&self, cap: usize) -> PermitFuture {
        let (tx, rx) = oneshot::channel();
        let mut state = self.inner.lock().expect("queue lock");
        state.queue.push_back(Waiter { cap, tx });
        state.dispatch();
        PermitFuture {
            rx,
            inner: self.inner.clone(),
        }
    }

    /// Run `task` under an exclusive permit.
    pub async fn exclusive<F>(&self, task: F) -> F::Output
    where
        F: Future,
    {
        let permit = self.acquire_exclusive().await;
        let output = task.await;
        drop(permit);
        output
    }

    /// Run `task` under a shared permit.
    pub async fn shared<F>(&self, task: F) -> F::Output
    where
        F: Future,
    {
        let permit = self.acquire_shared().await;
        let output = task.await;
        drop(permit);
        output
    }

    /// Number of currently active operations.
    pub fn active(&self) -> usize {
        self.inner.lock().expect("queue lock").active
    }

    /// Number of operations waiting in the queue.
    pub fn waiting(&self) -> usize {
        self.inner.lock().expect("queue lock").queue.len()
    }

    /// The configured shared-class maximum.
    pub fn max_shared(&self) -> usize {
        self.inner.lock().expect("queue lock").max_shared
    }
}

impl std::fmt::Debug for OpQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock().expect("queue lock");
        f.debug_struct("OpQueue")
            .field("max_shared", &state.max_shared)
            .field("active", &state.active)
            .field("waiting", &state.queue.len())
            .finish()
    }
}

/// A granted slot in the active set; released on drop.
pub struct OpPermit {
    inner: Arc<Mutex<QueueState>>,
}

impl std::fmt::Debug for OpPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpPermit").finish_non_exhaustive()
    }
}

impl Drop for OpPermit {
    fn drop(&mut self) {
        let mut state = self.inner.lock().expect("queue lock");
        state.active -= 1;
        trace!(active = state.active, "operation finished");
        state.dispatch();
    }
}

/// Pending permit; the queue position was taken when this was created.
pub struct PermitFuture {
    rx: oneshot::Receiver<()>,
    inner: Arc<Mutex<QueueState>>,
}

impl Future for PermitFuture {
    type Output = OpPermit;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(_) => Poll::Ready(OpPermit {
                inner: self.inner.clone(),
            }),
            Poll::Pending => Poll::Pending,
        }
    }
}
