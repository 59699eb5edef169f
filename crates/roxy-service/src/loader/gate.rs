use std::collections::VecDeque;

use tokio::sync::oneshot;
use url::Url;

/// The signal a queued waiter is resumed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The waiter now occupies a fetch slot.
    Proceed,
    /// The waiter was removed from the queue and must not fetch.
    Cancelled,
}

/// The result of [`AdmissionGate::acquire`].
#[derive(Debug)]
pub enum Acquired {
    /// A slot was free and is now occupied by the caller.
    Admitted,
    /// The ceiling was reached, the caller has to wait for its [`Admission`].
    Queued(oneshot::Receiver<Admission>),
}

/// A caller that is blocked because the concurrency ceiling was reached.
#[derive(Debug)]
struct Waiter {
    key: Url,
    generation: u64,
    signal: oneshot::Sender<Admission>,
}

/// Bounds the number of concurrently running fetches.
///
/// The gate does no locking on its own. It is meant to live inside the same lock as the
/// table of in-flight loads, so that "acquire", "release" and "cancel" are atomic with
/// respect to the table as well.
///
/// Waiters are released strictly in the order they were queued, independent of their key.
#[derive(Debug)]
pub struct AdmissionGate {
    active: usize,
    ceiling: usize,
    queue: VecDeque<Waiter>,
}

impl AdmissionGate {
    /// Creates a gate that admits up to `ceiling` fetches at a time.
    pub fn new(ceiling: usize) -> Self {
        // A ceiling of zero would never admit anything.
        let ceiling = ceiling.max(1);
        Self {
            active: 0,
            ceiling,
            queue: VecDeque::new(),
        }
    }

    /// Occupies a slot if one is free, otherwise enqueues a waiter for `key`.
    ///
    /// A queued waiter that is later resumed with [`Admission::Proceed`] has taken over the
    /// slot of whoever called [`release_slot`](Self::release_slot).
    pub fn acquire(&mut self, key: &Url, generation: u64) -> Acquired {
        if self.active < self.ceiling {
            self.active += 1;
            return Acquired::Admitted;
        }

        let (signal, receiver) = oneshot::channel();
        self.queue.push_back(Waiter {
            key: key.clone(),
            generation,
            signal,
        });
        Acquired::Queued(receiver)
    }

    /// Frees one slot and hands it to the oldest waiter, if there is one.
    ///
    /// Returns the key and generation of the waiter that now occupies the slot. Waiters
    /// whose receiving side is gone are skipped.
    pub fn release_slot(&mut self) -> Option<(Url, u64)> {
        if self.active == 0 {
            tracing::error!("Released a fetch slot that was never acquired");
            return None;
        }
        self.active -= 1;

        while let Some(waiter) = self.queue.pop_front() {
            if waiter.signal.send(Admission::Proceed).is_ok() {
                self.active += 1;
                return Some((waiter.key, waiter.generation));
            }
            tracing::trace!("Skipping abandoned waiter for `{}`", waiter.key);
        }
        None
    }

    /// Removes the waiters queued for `key`, resuming them with [`Admission::Cancelled`].
    ///
    /// Waiters for other keys keep their queue positions. Returns whether a waiter was
    /// removed.
    pub fn cancel_waiting(&mut self, key: &Url) -> bool {
        let mut cancelled = false;
        let mut remaining = VecDeque::with_capacity(self.queue.len());
        for waiter in self.queue.drain(..) {
            if &waiter.key == key {
                // the receiver may already be gone, which is fine
                let _ = waiter.signal.send(Admission::Cancelled);
                cancelled = true;
            } else {
                remaining.push_back(waiter);
            }
        }
        self.queue = remaining;
        cancelled
    }

    /// The number of currently occupied slots.
    pub fn active(&self) -> usize {
        self.active
    }

    /// The number of queued waiters.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// The configured ceiling.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}
