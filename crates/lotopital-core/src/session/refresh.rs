//! Single-flight access-token refresh.
//!
//! Every caller that hits a 401 while a refresh is already running awaits
//! that same refresh instead of starting another one. The refresh itself runs
//! on a spawned task so it finishes (and releases the slot) even when every
//! waiting caller has been cancelled.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::{debug, warn};

type PendingRefresh = Shared<BoxFuture<'static, Option<String>>>;
type Slot = Arc<Mutex<Option<PendingRefresh>>>;

#[derive(Default)]
pub(crate) struct RefreshGate {
    slot: Slot,
}

impl RefreshGate {
    /// Returns true while a refresh is in flight.
    pub(crate) fn is_in_flight(&self) -> bool {
        lock(&self.slot).is_some()
    }

    /// Joins the in-flight refresh, or starts one with `start`.
    ///
    /// Resolves to the new access token, or `None` when the refresh failed.
    pub(crate) async fn run<F>(&self, start: F) -> Option<String>
    where
        F: FnOnce() -> BoxFuture<'static, Option<String>>,
    {
        let pending = {
            let mut slot = lock(&self.slot);
            if let Some(pending) = slot.as_ref() {
                debug!("joining in-flight token refresh");
                pending.clone()
            } else {
                let pending = spawn_refresh(Arc::clone(&self.slot), start());
                *slot = Some(pending.clone());
                pending
            }
        };
        pending.await
    }
}

/// Clears the slot when the refresh task ends, whichever way it ends.
struct ReleaseSlot(Slot);

impl Drop for ReleaseSlot {
    fn drop(&mut self) {
        lock(&self.0).take();
    }
}

fn spawn_refresh(slot: Slot, refresh: BoxFuture<'static, Option<String>>) -> PendingRefresh {
    // The caller still holds the slot lock here, so the task cannot release
    // the slot before it has been filled.
    let task = tokio::spawn(async move {
        let _release = ReleaseSlot(slot);
        refresh.await
    });

    async move {
        match task.await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "token refresh task failed");
                None
            }
        }
    }
    .boxed()
    .shared()
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<PendingRefresh>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let gate = RefreshGate::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first_calls = Arc::clone(&calls);
        let first = gate.run(move || {
            async move {
                first_calls.fetch_add(1, Ordering::SeqCst);
                let _ = release_rx.await;
                Some("token-1".to_string())
            }
            .boxed()
        });
        let second_calls = Arc::clone(&calls);
        let second = gate.run(move || {
            async move {
                second_calls.fetch_add(1, Ordering::SeqCst);
                Some("token-2".to_string())
            }
            .boxed()
        });

        let release = async {
            tokio::task::yield_now().await;
            let _ = release_tx.send(());
        };

        let (a, b, ()) = tokio::join!(first, second, release);
        assert_eq!(a.as_deref(), Some("token-1"));
        assert_eq!(b.as_deref(), Some("token-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!gate.is_in_flight());
    }

    #[tokio::test]
    async fn test_failed_refresh_releases_slot() {
        let gate = RefreshGate::default();

        let token = gate.run(|| async { None }.boxed()).await;
        assert_eq!(token, None);
        assert!(!gate.is_in_flight());

        let token = gate
            .run(|| async { Some("next".to_string()) }.boxed())
            .await;
        assert_eq!(token.as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn test_panicking_refresh_releases_slot() {
        let gate = RefreshGate::default();

        let token = gate
            .run(|| {
                async {
                    let token: Option<String> = None;
                    assert!(token.is_some(), "refresh blew up");
                    token
                }
                .boxed()
            })
            .await;
        assert_eq!(token, None);
        assert!(!gate.is_in_flight());
    }

    #[tokio::test]
    async fn test_abandoned_refresh_still_completes() {
        let gate = RefreshGate::default();

        let waiter = gate.run(|| {
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Some("late".to_string())
            }
            .boxed()
        });
        // Poll once so the refresh task is spawned, then drop the only waiter.
        let timed_out = tokio::time::timeout(Duration::from_millis(1), waiter).await;
        assert!(timed_out.is_err());
        assert!(gate.is_in_flight());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!gate.is_in_flight());
    }
}
