//! Cancel-safe queue of deferred reads.
//!
//! Read requests wait here until the collaborator delivers an input report.
//! Three parties race to take a queued request out: the delivery callback,
//! the suspend/remove drain, and the request's originator cancelling it. All
//! three remove under the same lock, and whichever removes the request owns
//! its completion. The others find nothing and do nothing.
//!
//! The queue also carries the "accepting new work" gate. Because the gate is
//! checked under the queue lock, a read can never slip into the queue after
//! the gate was closed and the queue drained.
//!
//! No request is completed while the lock is held.

mod slab;

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::{request::Request, HidError, Result};

pub use self::slab::SlotKey;
use self::slab::LinkedSlab;

/// State guarded by the queue lock.
pub struct QueueState {
    requests: LinkedSlab<Request>,
    open: bool,
}

impl QueueState {
    /// Number of queued requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Whether new requests are accepted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Remove the oldest request that is not already being cancelled.
    pub fn remove_oldest(&mut self) -> Option<Request> {
        // A request whose cancel routine has been taken belongs to the
        // canceller, which is waiting for this lock to unlink it.
        self.requests
            .pop_front_where(|request| request.cancel_token().disarm())
    }

    fn remove_all(&mut self) -> Vec<Request> {
        let mut removed = Vec::with_capacity(self.requests.len());
        while let Some(request) = self.remove_oldest() {
            removed.push(request);
        }
        removed
    }
}

impl Drop for QueueState {
    fn drop(&mut self) {
        // Reads whose cancellation is in flight are left to drop on their own.
        let remaining = self.remove_all();
        complete_not_ready(remaining);
    }
}

/// FIFO queue of pending read requests.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct PendingQueue {
    shared: Arc<Mutex<QueueState>>,
}

impl PendingQueue {
    /// Create an empty queue. The queue starts open.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(QueueState {
                requests: LinkedSlab::new(),
                open: true,
            })),
        }
    }

    /// Run `f` with the queue lock held.
    ///
    /// `f` must not block, complete requests, or call back into the queue.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut QueueState) -> R) -> R {
        let mut state = self.shared.lock();
        f(&mut state)
    }

    /// Queue `request` at the tail.
    ///
    /// If the queue is closed, or the request was cancelled before it got
    /// here, the request is completed with [`HidError::NotReady`] and that
    /// error is returned. Ownership of the request makes inserting the same
    /// request twice unrepresentable.
    pub fn insert(&self, request: Request) -> Result<SlotKey> {
        let token = request.cancel_token().clone();
        let id = request.id();

        let mut state = self.shared.lock();
        if !state.open || token.is_cancelled() {
            drop(state);
            tracing::debug!(request = %id, "read refused, queue closed or request cancelled");
            request.complete(Err(HidError::NotReady));
            return Err(HidError::NotReady);
        }

        let key = state.requests.push_back(request);
        let queue = Arc::downgrade(&self.shared);
        token.arm(Box::new(move || cancel_queued(&queue, key)));

        // A cancel that raced with arming either took the routine (and will
        // unlink the request once we release the lock) or left it for us.
        if token.is_cancelled() && token.disarm() {
            let request = state.requests.remove(key);
            drop(state);
            if let Some(request) = request {
                request.complete(Err(HidError::NotReady));
            }
            return Err(HidError::NotReady);
        }

        tracing::debug!(request = %id, pending = state.len(), "read queued");
        Ok(key)
    }

    /// Remove the oldest queued request.
    pub fn remove_oldest(&self) -> Option<Request> {
        self.with_lock(QueueState::remove_oldest)
    }

    /// Remove the request queued under `key`.
    ///
    /// Returns `None` if the request already left the queue, or if its
    /// cancellation is in flight.
    pub fn remove(&self, key: SlotKey) -> Option<Request> {
        self.with_lock(|state| {
            let in_queue = state
                .requests
                .get(key)
                .is_some_and(|request| request.cancel_token().disarm());
            if in_queue {
                state.requests.remove(key)
            } else {
                None
            }
        })
    }

    /// Fail every queued request with [`HidError::NotReady`].
    ///
    /// Returns the number of requests completed.
    pub fn drain(&self) -> usize {
        let drained = self.with_lock(QueueState::remove_all);
        complete_not_ready(drained)
    }

    /// Stop accepting requests and drain the queue, as one step.
    ///
    /// Returns `None` if the queue was already closed.
    pub fn close(&self) -> Option<usize> {
        let drained = self.with_lock(|state| {
            if !state.open {
                return None;
            }
            state.open = false;
            Some(state.remove_all())
        })?;
        Some(complete_not_ready(drained))
    }

    /// Accept requests again. Returns `false` if the queue was already open.
    pub fn open(&self) -> bool {
        self.with_lock(|state| !std::mem::replace(&mut state.open, true))
    }

    /// Whether new requests are accepted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.with_lock(|state| state.is_open())
    }

    /// Number of queued requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_lock(|state| state.len())
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn downgrade(&self) -> WeakQueue {
        WeakQueue(Arc::downgrade(&self.shared))
    }
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-owning reference to a [`PendingQueue`].
#[derive(Clone)]
pub(crate) struct WeakQueue(Weak<Mutex<QueueState>>);

impl WeakQueue {
    pub fn upgrade(&self) -> Option<PendingQueue> {
        self.0.upgrade().map(|shared| PendingQueue { shared })
    }
}

/// Cancel routine armed on every queued request.
fn cancel_queued(queue: &Weak<Mutex<QueueState>>, key: SlotKey) {
    let Some(shared) = queue.upgrade() else {
        return;
    };
    // The routine was already taken from the token, so unlink directly.
    let request = shared.lock().requests.remove(key);
    match request {
        Some(request) => {
            tracing::debug!(request = %request.id(), "queued read cancelled");
            request.complete(Err(HidError::NotReady));
        }
        None => tracing::trace!("cancelled read already left the queue"),
    }
}

fn complete_not_ready(requests: Vec<Request>) -> usize {
    let count = requests.len();
    for request in requests {
        request.complete(Err(HidError::NotReady));
    }
    if count > 0 {
        tracing::debug!(count, "drained pending reads");
    }
    count
}
