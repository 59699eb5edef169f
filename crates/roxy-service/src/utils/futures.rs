use std::future::Future;
use std::time::Instant;

/// State of the [`MeasureGuard`].
#[derive(Clone, Copy, Debug)]
enum MeasureState {
    /// The future is not ready.
    Pending,
    /// The future has terminated with a status.
    Done(&'static str),
}

/// A guard to [`measure`] the execution of futures.
struct MeasureGuard<'a> {
    state: MeasureState,
    task_name: &'a str,
    creation_time: Instant,
}

impl<'a> MeasureGuard<'a> {
    /// Creates a new measure guard.
    pub fn new(task_name: &'a str) -> Self {
        Self {
            state: MeasureState::Pending,
            task_name,
            creation_time: Instant::now(),
        }
    }

    /// Marks the future as terminated.
    pub fn done(mut self, status: &'static str) {
        self.state = MeasureState::Done(status);
    }
}

impl Drop for MeasureGuard<'_> {
    fn drop(&mut self) {
        // A future that is dropped before completion was aborted, which the loader
        // only does when cancelling a load.
        let status = match self.state {
            MeasureState::Pending => "cancelled",
            MeasureState::Done(status) => status,
        };

        metric!(
            timer(self.task_name) = self.creation_time.elapsed(),
            "status" => status,
        );
    }
}

/// Measures the timing of a future and reports it as a timer metric named `task_name`.
///
/// The metric is tagged with a status derived with the `get_status` function, or with
/// `"cancelled"` if the future is dropped before it completes. See the [`m`] module for
/// status helpers.
pub fn measure<'a, S, F>(
    task_name: &'a str,
    get_status: S,
    f: F,
) -> impl Future<Output = F::Output> + 'a
where
    F: 'a + Future,
    S: 'a + FnOnce(&F::Output) -> &'static str,
{
    let guard = MeasureGuard::new(task_name);

    async move {
        let output = f.await;
        guard.done(get_status(&output));
        output
    }
}

/// Status helpers for [`measure`].
pub mod m {
    use crate::fetch::FetchResult;

    /// Creates a status derived from a fetch result for [`measure`](super::measure).
    ///
    ///  - `"payload"` if the fetch produced bytes
    ///  - `"empty"` if the fetch succeeded without a usable payload
    ///  - `"failed"` if the fetch failed
    pub fn fetch(result: &FetchResult) -> &'static str {
        match result {
            Ok(Some(_)) => "payload",
            Ok(None) => "empty",
            Err(_) => "failed",
        }
    }
}
