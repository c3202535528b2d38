//! Toast notifications.
//!
//! Each session owns a [`ToastStack`]: an insertion-ordered list of short
//! messages published through a `tokio::sync::watch` channel. A toast with a
//! timeout hides itself when the timeout elapses and is removed once the
//! fade-out window has passed; dismissing a toast hides it immediately and
//! removes it after the same window.
//!
//! The [`ToastHub`] maps sessions to their stacks. Only a random channel key
//! is stored in the session itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tower_sessions::Session;
use uuid::Uuid;

use crate::models::session::channel_id;

/// Time between a toast being hidden and it being removed from the stack.
pub const FADE_OUT: Duration = Duration::from_millis(300);

const CAUTION_TIMEOUT: Duration = Duration::from_secs(5);
const ERROR_TIMEOUT: Duration = Duration::from_secs(6);

/// Stacks idle for this long are dropped from the hub.
const HUB_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Identifier of a toast within its stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToastId(u64);

impl ToastId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Info,
    Caution,
    Error,
}

impl ToastKind {
    /// Timeout for this kind when the caller does not choose one.
    ///
    /// `base` is the configured success/info timeout.
    #[must_use]
    pub const fn default_timeout(self, base: Duration) -> Duration {
        match self {
            Self::Success | Self::Info => base,
            Self::Caution => CAUTION_TIMEOUT,
            Self::Error => ERROR_TIMEOUT,
        }
    }

    /// Name used for styling and ARIA roles in templates.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Caution => "caution",
            Self::Error => "error",
        }
    }
}

/// How long a toast stays visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastTimeout {
    /// The kind's default.
    Default,
    /// A specific duration.
    After(Duration),
    /// Until dismissed.
    Sticky,
}

/// A single notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: ToastId,
    pub message: String,
    pub kind: ToastKind,
    /// `None` for sticky toasts.
    #[serde(with = "duration_millis")]
    pub timeout: Option<Duration>,
    pub is_visible: bool,
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }
}

// =============================================================================
// Stack
// =============================================================================

/// Insertion-ordered toast list with change notifications.
#[derive(Clone)]
pub struct ToastStack {
    inner: Arc<ToastStackInner>,
}

struct ToastStackInner {
    tx: watch::Sender<Vec<Toast>>,
    next_id: AtomicU64,
    default_timeout: Duration,
}

impl ToastStack {
    /// Create an empty stack. `default_timeout` applies to success and info
    /// toasts.
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(ToastStackInner {
                tx,
                next_id: AtomicU64::new(1),
                default_timeout,
            }),
        }
    }

    /// Show a toast. Must be called from within a tokio runtime when the
    /// toast has a timeout.
    pub fn push(&self, message: impl Into<String>, kind: ToastKind, timeout: ToastTimeout) -> ToastId {
        let id = ToastId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let timeout = match timeout {
            ToastTimeout::Default => Some(kind.default_timeout(self.inner.default_timeout)),
            ToastTimeout::After(duration) => Some(duration),
            ToastTimeout::Sticky => None,
        };

        self.inner.tx.send_modify(|toasts| {
            toasts.push(Toast {
                id,
                message: message.into(),
                kind,
                timeout,
                is_visible: true,
            });
        });

        if let Some(timeout) = timeout {
            let stack = Arc::downgrade(&self.inner);
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if hide(&stack, id) {
                    tokio::time::sleep(FADE_OUT).await;
                    remove(&stack, id);
                }
            });
        }

        id
    }

    pub fn success(&self, message: impl Into<String>) -> ToastId {
        self.push(message, ToastKind::Success, ToastTimeout::Default)
    }

    pub fn info(&self, message: impl Into<String>) -> ToastId {
        self.push(message, ToastKind::Info, ToastTimeout::Default)
    }

    pub fn caution(&self, message: impl Into<String>) -> ToastId {
        self.push(message, ToastKind::Caution, ToastTimeout::Default)
    }

    pub fn error(&self, message: impl Into<String>) -> ToastId {
        self.push(message, ToastKind::Error, ToastTimeout::Default)
    }

    /// Hide a toast now and remove it after the fade-out window.
    ///
    /// Returns `false` if the toast is unknown or already hidden.
    pub fn dismiss(&self, id: ToastId) -> bool {
        let weak = Arc::downgrade(&self.inner);
        if !hide(&weak, id) {
            return false;
        }
        tokio::spawn(async move {
            tokio::time::sleep(FADE_OUT).await;
            remove(&weak, id);
        });
        true
    }

    /// Toasts currently shown, oldest first.
    #[must_use]
    pub fn visible(&self) -> Vec<Toast> {
        self.inner
            .tx
            .borrow()
            .iter()
            .filter(|t| t.is_visible)
            .cloned()
            .collect()
    }

    /// Every toast in the stack, including those fading out.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Toast> {
        self.inner.tx.borrow().clone()
    }

    /// Watch the stack for changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Toast>> {
        self.inner.tx.subscribe()
    }
}

fn hide(stack: &Weak<ToastStackInner>, id: ToastId) -> bool {
    let Some(inner) = stack.upgrade() else {
        return false;
    };
    inner.tx.send_if_modified(|toasts| {
        match toasts.iter_mut().find(|t| t.id == id && t.is_visible) {
            Some(toast) => {
                toast.is_visible = false;
                true
            }
            None => false,
        }
    })
}

fn remove(stack: &Weak<ToastStackInner>, id: ToastId) {
    if let Some(inner) = stack.upgrade() {
        inner.tx.send_if_modified(|toasts| {
            let before = toasts.len();
            toasts.retain(|t| t.id != id);
            toasts.len() != before
        });
    }
}

// =============================================================================
// Hub
// =============================================================================

/// Per-session registry of toast stacks.
#[derive(Clone)]
pub struct ToastHub {
    stacks: Cache<Uuid, ToastStack>,
    default_timeout: Duration,
}

impl ToastHub {
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            stacks: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(HUB_IDLE_TTL)
                .build(),
            default_timeout,
        }
    }

    /// The stack belonging to `session`, creating its channel on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be read or written.
    pub async fn for_session(
        &self,
        session: &Session,
    ) -> Result<ToastStack, tower_sessions::session::Error> {
        let key = channel_id(session).await?;

        let default_timeout = self.default_timeout;
        Ok(self
            .stacks
            .get_with(key, async move { ToastStack::new(default_timeout) })
            .await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    const BASE: Duration = Duration::from_secs(3);

    async fn settle() {
        // Let spawned timer tasks observe the advanced clock.
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_default_timeouts() {
        assert_eq!(ToastKind::Success.default_timeout(BASE), BASE);
        assert_eq!(ToastKind::Info.default_timeout(BASE), BASE);
        assert_eq!(ToastKind::Caution.default_timeout(BASE), Duration::from_secs(5));
        assert_eq!(ToastKind::Error.default_timeout(BASE), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_toast_expires_after_timeout() {
        let stack = ToastStack::new(BASE);
        let id = stack.success("Added to cart");
        assert_eq!(stack.visible().len(), 1);

        tokio::time::sleep(BASE - Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(stack.visible().len(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert!(stack.visible().is_empty());
        // Still fading out
        assert_eq!(stack.snapshot().len(), 1);
        assert_eq!(stack.snapshot()[0].id, id);

        tokio::time::sleep(FADE_OUT).await;
        settle().await;
        assert!(stack.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_hides_immediately_and_removes_after_fade() {
        let stack = ToastStack::new(BASE);
        let id = stack.push("Saved", ToastKind::Info, ToastTimeout::Sticky);

        assert!(stack.dismiss(id));
        assert!(stack.visible().is_empty());
        assert!(!stack.dismiss(id));

        tokio::time::sleep(FADE_OUT + Duration::from_millis(1)).await;
        settle().await;
        assert!(stack.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sticky_toast_stays() {
        let stack = ToastStack::new(BASE);
        stack.push("Heads up", ToastKind::Caution, ToastTimeout::Sticky);

        tokio::time::sleep(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(stack.visible().len(), 1);
        assert_eq!(stack.visible()[0].timeout, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insertion_order_is_kept() {
        let stack = ToastStack::new(BASE);
        stack.error("first");
        stack.info("second");
        stack.caution("third");

        let messages: Vec<_> = stack.visible().into_iter().map(|t| t.message).collect();
        assert_eq!(messages, ["first", "second", "third"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_changes() {
        let stack = ToastStack::new(BASE);
        let mut rx = stack.subscribe();

        stack.info("hello");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);
    }

    #[tokio::test]
    async fn test_hub_reuses_stack_per_session() {
        let hub = ToastHub::new(BASE);
        let store = Arc::new(MemoryStore::default());
        let session = Session::new(None, store.clone(), None);
        let other = Session::new(None, store, None);

        let a = hub.for_session(&session).await.unwrap();
        a.push("one", ToastKind::Info, ToastTimeout::Sticky);

        let again = hub.for_session(&session).await.unwrap();
        assert_eq!(again.visible().len(), 1);

        let b = hub.for_session(&other).await.unwrap();
        assert!(b.visible().is_empty());
    }
}
