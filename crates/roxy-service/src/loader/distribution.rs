use std::fmt;

use futures::FutureExt;
use futures::future::Shared;
use tokio::sync::oneshot;

/// Creates a connected single-assignment [`Completer`] / [`Promise`] pair.
pub fn promise<T: Clone>() -> (Completer<T>, Promise<T>) {
    let (sender, receiver) = oneshot::channel();
    (Completer(sender), Promise(receiver.shared()))
}

/// The writing half of a [`Promise`].
///
/// Completing consumes the completer, so a value can only ever be written once.
#[derive(Debug)]
pub struct Completer<T>(oneshot::Sender<T>);

impl<T> Completer<T> {
    /// Completes the promise for every current and future waiter.
    pub fn complete(self, value: T) {
        // Nobody might be waiting anymore, which is fine.
        let _ = self.0.send(value);
    }
}

/// A value that will be written once and can be awaited by any number of waiters.
///
/// Cloning a promise attaches another waiter. Waiters that attach after completion
/// observe the value immediately.
#[derive(Clone)]
pub struct Promise<T: Clone>(Shared<oneshot::Receiver<T>>);

impl<T: Clone> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("complete", &self.0.peek().is_some())
            .finish()
    }
}

impl<T: Clone> Promise<T> {
    /// Waits for the value.
    ///
    /// Returns `None` if the [`Completer`] was dropped without completing.
    pub async fn wait(self) -> Option<T> {
        self.0.await.ok()
    }
}
