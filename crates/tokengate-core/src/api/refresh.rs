//! Single-flight guard for token refreshes.
//!
//! The first caller to need a refresh starts it; callers arriving while it
//! runs await the same outcome. The refresh runs in its own task so that it
//! completes, and its effects apply, even if every caller walks away.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use super::RefreshFailure;
use crate::auth::Credential;

type RefreshOutcome = Result<Credential, RefreshFailure>;

struct InFlight {
    id: u64,
    outcome: Shared<BoxFuture<'static, RefreshOutcome>>,
}

#[derive(Default)]
pub struct RefreshGuard {
    in_flight: Mutex<Option<InFlight>>,
    next_id: AtomicU64,
}

impl RefreshGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the in-flight refresh, or spawn `start()` if there is none.
    pub async fn run<F, Fut>(&self, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome> + Send + 'static,
    {
        let (id, outcome) = {
            let mut slot = self.in_flight.lock();
            // A finished outcome still parked in the slot is stale
            let joinable = slot
                .as_ref()
                .filter(|flight| flight.outcome.peek().is_none())
                .map(|flight| (flight.id, flight.outcome.clone()));

            match joinable {
                Some((id, outcome)) => {
                    debug!(refresh_id = id, "Joining in-flight refresh");
                    (id, outcome)
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    debug!(refresh_id = id, "Starting refresh");
                    let task = tokio::spawn(start());
                    let outcome = async move {
                        match task.await {
                            Ok(outcome) => outcome,
                            Err(e) => Err(RefreshFailure::Aborted(e.to_string())),
                        }
                    }
                    .boxed()
                    .shared();
                    *slot = Some(InFlight {
                        id,
                        outcome: outcome.clone(),
                    });
                    (id, outcome)
                }
            }
        };

        let result = outcome.await;

        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|flight| flight.id == id) {
            *slot = None;
        }
        result
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
            .lock()
            .as_ref()
            .is_some_and(|flight| flight.outcome.peek().is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let guard = RefreshGuard::new();
        let starts = Arc::new(AtomicUsize::new(0));

        let start = || {
            let starts = Arc::clone(&starts);
            move || async move {
                starts.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Credential::new("t2"))
            }
        };

        let (a, b, c) = tokio::join!(guard.run(start()), guard.run(start()), guard.run(start()));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        for outcome in [a, b, c] {
            assert_eq!(outcome.expect("refresh succeeds"), Credential::new("t2"));
        }
        assert!(!guard.is_in_flight());
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_run() {
        let guard = RefreshGuard::new();
        let starts = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let starts = Arc::clone(&starts);
            let outcome = guard
                .run(move || async move {
                    starts.fetch_add(1, Ordering::SeqCst);
                    Err(RefreshFailure::MissingCredential)
                })
                .await;
            assert!(matches!(outcome, Err(RefreshFailure::MissingCredential)));
        }
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_survives_abandoned_caller() {
        let guard = Arc::new(RefreshGuard::new());
        let finished = Arc::new(AtomicUsize::new(0));

        let flag = Arc::clone(&finished);
        let caller = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move {
                guard
                    .run(move || async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        flag.fetch_add(1, Ordering::SeqCst);
                        Ok(Credential::new("t2"))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        caller.abort();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
