use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

/// Map of values built once per key.
///
/// The map lock is only held to find or create a key's cell, so a slow
/// init for one key never stalls another. Callers racing on the same key
/// all wait for a single init and see its value.
pub struct Slots<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for Slots<K, V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Slots<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.cells.lock().get(key).and_then(|cell| cell.get().cloned())
    }

    /// Value for `key`, running `init` if there is none yet. A failed init
    /// leaves the key empty for the next caller.
    pub async fn get_or_try_init<F, Fut, E>(&self, key: &K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self.cells.lock().entry(key.clone()).or_default().clone();
        cell.get_or_try_init(init).await.cloned()
    }

    /// Drop `key` if its current value satisfies `matches`.
    pub fn remove_if(&self, key: &K, matches: impl Fn(&V) -> bool) -> bool {
        let mut cells = self.cells.lock();
        if cells.get(key).and_then(|cell| cell.get()).is_some_and(matches) {
            cells.remove(key);
            true
        } else {
            false
        }
    }

    /// Keys that hold a value.
    pub fn keys(&self) -> Vec<K> {
        self.cells
            .lock()
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.cells.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    async fn until(flag: &AtomicBool) {
        while !flag.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_stalled_init_does_not_block_other_keys() {
        let slots: Arc<Slots<&'static str, u32>> = Arc::new(Slots::new());
        let started = Arc::new(AtomicBool::new(false));
        let (_hold, never) = oneshot::channel::<()>();

        let stalled = {
            let slots = slots.clone();
            let started = started.clone();
            tokio::spawn(async move {
                slots
                    .get_or_try_init(&"slow", || async move {
                        started.store(true, Ordering::SeqCst);
                        let _ = never.await;
                        Ok::<_, ()>(0)
                    })
                    .await
            })
        };
        until(&started).await;

        let fast = tokio::time::timeout(
            Duration::from_secs(1),
            slots.get_or_try_init(&"fast", || async { Ok::<_, ()>(7) }),
        )
        .await;
        assert_eq!(fast.unwrap(), Ok(7));
        assert_eq!(slots.keys(), vec!["fast"]);

        stalled.abort();
    }

    #[tokio::test]
    async fn test_racing_callers_share_one_init() {
        let slots: Arc<Slots<&'static str, u32>> = Arc::new(Slots::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(AtomicBool::new(false));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = {
            let slots = slots.clone();
            let runs = runs.clone();
            let started = started.clone();
            tokio::spawn(async move {
                slots
                    .get_or_try_init(&"chan", || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        started.store(true, Ordering::SeqCst);
                        let _ = release_rx.await;
                        Ok::<_, ()>(1)
                    })
                    .await
            })
        };
        until(&started).await;

        let second = {
            let slots = slots.clone();
            let runs = runs.clone();
            tokio::spawn(async move {
                slots
                    .get_or_try_init(&"chan", || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, ()>(2)
                    })
                    .await
            })
        };

        // the second caller waits for the first init to finish
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!second.is_finished());

        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap(), Ok(1));
        assert_eq!(second.await.unwrap(), Ok(1));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_init_can_be_retried() {
        let slots: Slots<&'static str, u32> = Slots::new();

        let failed = slots.get_or_try_init(&"a", || async { Err("unreachable") }).await;
        assert_eq!(failed, Err("unreachable"));
        assert!(slots.keys().is_empty());

        let value = slots.get_or_try_init(&"a", || async { Ok::<_, &str>(3) }).await;
        assert_eq!(value, Ok(3));

        assert!(!slots.remove_if(&"a", |v| *v == 4));
        assert!(slots.remove_if(&"a", |v| *v == 3));
        assert_eq!(slots.get(&"a"), None);
    }
}
