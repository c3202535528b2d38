//! Keyed debouncing.
//!
//! A call waits for the debounce window and then runs only if no newer call
//! for the same key arrived in the meantime. A result that comes back after
//! a newer call was scheduled is discarded as well, so callers only ever act
//! on the latest call's outcome.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;

/// Tickets for keys idle this long are dropped.
const TICKET_IDLE_TTL: Duration = Duration::from_secs(10 * 60);

/// Outcome of a debounced call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debounced<T> {
    /// This was the latest call; here is its result.
    Ran(T),
    /// A newer call for the same key took over.
    Superseded,
}

impl<T> Debounced<T> {
    /// The result, if the call was not superseded.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Ran(value) => Some(value),
            Self::Superseded => None,
        }
    }
}

/// Debouncer for calls grouped by key.
#[derive(Clone)]
pub struct Debouncer<K>
where
    K: Hash + Eq + Send + Sync + 'static,
{
    tickets: Cache<K, Arc<AtomicU64>>,
    delay: Duration,
}

impl<K> Debouncer<K>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            tickets: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(TICKET_IDLE_TTL)
                .build(),
            delay,
        }
    }

    /// The debounce window.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `call` for `key`.
    ///
    /// Waits for the window, then runs `call` unless a newer call for `key`
    /// was scheduled. Dropping the returned future cancels the call.
    pub async fn run<F, Fut, T>(&self, key: K, call: F) -> Debounced<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let ticket = self
            .tickets
            .get_with(key, async { Arc::new(AtomicU64::new(0)) })
            .await;
        let generation = ticket.fetch_add(1, Ordering::AcqRel) + 1;

        tokio::time::sleep(self.delay).await;
        if ticket.load(Ordering::Acquire) != generation {
            return Debounced::Superseded;
        }

        let value = call().await;
        if ticket.load(Ordering::Acquire) != generation {
            tracing::debug!("Discarding superseded debounced result");
            return Debounced::Superseded;
        }
        Debounced::Ran(value)
    }
}
