//! Request cancellation.
//!
//! A [`CancellationToken`] is fired by the transport when the client goes
//! away. The dispatcher seeds it into every request scope, so handlers and
//! stages can also observe it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::handler::BoxFuture;

/// A token used to signal cancellation across async operations.
///
/// Cloning shares the same state. Child tokens fire with their parent.
///
/// # Examples
///
/// ```
/// use ferrous_web::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let token = CancellationToken::new();
/// let child = token.child_token();
///
/// let waiter = tokio::spawn({
///     let child = child.clone();
///     async move { child.cancelled().await }
/// });
///
/// token.cancel();
/// waiter.await.unwrap();
/// assert!(child.is_cancelled());
/// # }
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
    parent: Option<CancellationToken>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that is cancelled when either it or `self` is.
    pub fn child_token(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: Some(self.clone()),
                ..Inner::default()
            }),
        }
    }

    /// Cancels the token and wakes every waiter.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        self.inner
            .parent
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Completes once the token (or an ancestor) is cancelled.
    pub fn cancelled(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match &self.inner.parent {
                Some(parent) => {
                    tokio::select! {
                        _ = self.wait_own() => {}
                        _ = parent.cancelled() => {}
                    }
                }
                None => self.wait_own().await,
            }
        })
    }

    async fn wait_own(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not missed.
            notified.as_mut().enable();
            if self.inner.cancelled.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
