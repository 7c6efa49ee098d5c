//! Single-flight coordination of cache misses
//!
//! For a given key at most one fetch runs at a time. The first caller (the leader) runs the
//! fetch; callers arriving while it runs attach to a `watch` channel and receive a clone of
//! the leader's outcome, errors included.
//!
//! The pending entry is removed before the outcome is published, and also when the leader
//! is dropped mid-fetch. In that case the channel closes and waiters fail with a registry
//! error.

use crate::error::{RegistryClientError, Result};
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

type Outcome<V> = Option<Result<V>>;

/// Pending-fetch table keyed by `K`
#[derive(Debug)]
pub struct SingleFlight<K, V> {
    pending: Mutex<HashMap<K, watch::Receiver<Outcome<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }
}

enum Role<V> {
    Leader(watch::Sender<Outcome<V>>),
    Waiter(watch::Receiver<Outcome<V>>),
}

/// Removes the pending entry when the leader settles or is dropped.
struct PendingGuard<'a, K: Eq + Hash, V> {
    flight: &'a SingleFlight<K, V>,
    key: Option<K>,
}

impl<K: Eq + Hash, V> Drop for PendingGuard<'_, K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.flight
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fetches currently in flight
    pub fn in_flight(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run `fetch` for `key` unless a fetch for it is already running, in which case wait
    /// for that one and share its outcome.
    pub async fn run<F, Fut>(&self, key: K, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let role = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            match pending.get(&key) {
                Some(receiver) => Role::Waiter(receiver.clone()),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    pending.insert(key.clone(), receiver);
                    Role::Leader(sender)
                }
            }
        };

        match role {
            Role::Leader(sender) => {
                let guard = PendingGuard {
                    flight: self,
                    key: Some(key),
                };

                let outcome = fetch().await;

                drop(guard);
                sender.send_replace(Some(outcome.clone()));
                outcome
            }
            Role::Waiter(mut receiver) => {
                tracing::debug!(key = ?key, "Joining in-flight fetch");

                let outcome = receiver
                    .wait_for(Option::is_some)
                    .await
                    .map(|settled| settled.clone());

                match outcome {
                    Ok(Some(result)) => result,
                    _ => Err(RegistryClientError::registry(
                        None,
                        format!("In-flight fetch for {:?} was cancelled", key),
                    )),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_single_caller() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();
        let value = flight.run(1, || async { Ok("a".to_string()) }).await.unwrap();
        assert_eq!(value, "a");
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let flight = Arc::new(SingleFlight::<u32, usize>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let calls = calls.clone();
            let release = release.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run(42, || async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        release.notified().await;
                        Ok(n + 100)
                    })
                    .await
            }));
        }

        while flight.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        release.notify_waiters();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 100);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_waiters_share_error() {
        let flight = Arc::new(SingleFlight::<u32, usize>::new());
        let release = Arc::new(Notify::new());

        let leader = {
            let flight = flight.clone();
            let release = release.clone();
            tokio::spawn(async move {
                flight
                    .run(1, || async move {
                        release.notified().await;
                        Err(RegistryClientError::registry(Some(500), "registry down"))
                    })
                    .await
            })
        };

        while flight.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        let waiter = {
            let flight = flight.clone();
            tokio::spawn(async move { flight.run(1, || async { Ok(7) }).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        release.notify_waiters();

        let leader_err = leader.await.unwrap().unwrap_err();
        let waiter_err = waiter.await.unwrap().unwrap_err();
        assert_eq!(leader_err.status(), Some(500));
        assert_eq!(waiter_err.to_string(), leader_err.to_string());
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_entry_removed_after_failure_allows_new_fetch() {
        let flight: SingleFlight<u32, usize> = SingleFlight::new();

        let first = flight
            .run(3, || async { Err(RegistryClientError::registry(None, "reset")) })
            .await;
        assert!(first.is_err());

        let second = flight.run(3, || async { Ok(9) }).await;
        assert_eq!(second.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_cancelled_leader_fails_waiters() {
        let flight = Arc::new(SingleFlight::<u32, usize>::new());

        let leader = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run(5, || async {
                        std::future::pending::<()>().await;
                        Ok(1)
                    })
                    .await
            })
        };

        while flight.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        let waiter = {
            let flight = flight.clone();
            tokio::spawn(async move { flight.run(5, || async { Ok(2) }).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        assert_eq!(flight.in_flight(), 0);
    }
}
