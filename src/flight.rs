//! Per-key single-flight execution.
//!
//! Concurrent callers asking for the same key share one execution of the
//! work. The work runs in a detached task, so a caller that gives up (timeout,
//! dropped request) never abandons it half-way; later callers and the cache
//! still benefit from the result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::error;

use crate::error::ThumbnailError;

/// Shared state for one in-flight execution.
struct InFlightState<T> {
    /// Notification for waiters
    notify: Notify,
    /// Result of the work (set when complete)
    result: Mutex<Option<Result<T, ThumbnailError>>>,
}

/// Deduplicates concurrent executions of work keyed by string.
pub struct SingleFlight<T> {
    in_flight: Arc<Mutex<HashMap<String, Arc<InFlightState<T>>>>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `work` for `key`, or join the execution already running for it.
    ///
    /// Only the first caller's `work` is spawned; followers drop theirs.
    pub async fn run<F>(&self, key: &str, work: F) -> Result<T, ThumbnailError>
    where
        F: Future<Output = Result<T, ThumbnailError>> + Send + 'static,
    {
        let state = {
            let mut in_flight = self.in_flight.lock().await;

            if let Some(state) = in_flight.get(key) {
                // Another task is already working on this key
                state.clone()
            } else {
                let state = Arc::new(InFlightState {
                    notify: Notify::new(),
                    result: Mutex::new(None),
                });
                in_flight.insert(key.to_string(), state.clone());
                drop(in_flight);

                self.spawn_leader(key.to_string(), state.clone(), work);
                state
            }
        };

        loop {
            // Register interest before checking, so a completion between the
            // check and the await is not missed.
            let notified = state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(ref result) = *state.result.lock().await {
                return result.clone();
            }

            notified.await;
        }
    }

    fn spawn_leader<F>(&self, key: String, state: Arc<InFlightState<T>>, work: F)
    where
        F: Future<Output = Result<T, ThumbnailError>> + Send + 'static,
    {
        let in_flight = Arc::clone(&self.in_flight);

        tokio::spawn(async move {
            // A panic in the work must still release the waiters.
            let result = match tokio::spawn(work).await {
                Ok(result) => result,
                Err(e) => {
                    error!(key = %key, "Single-flight task failed: {}", e);
                    Err(ThumbnailError::Internal {
                        message: e.to_string(),
                    })
                }
            };

            {
                let mut result_guard = state.result.lock().await;
                *result_guard = Some(result);
            }

            {
                let mut in_flight = in_flight.lock().await;
                in_flight.remove(&key);
            }
            state.notify.notify_waiters();
        });
    }

    /// Number of keys currently being worked on.
    #[cfg(test)]
    async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
