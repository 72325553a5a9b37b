//! Diagnostic observers for resolution events.
//!
//! Observers see every capability resolution: its start, its completion with
//! elapsed time, and failures. With no observers registered the resolution
//! path skips timing entirely.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{DiError, DiResult};
use crate::key::Key;

/// Observer trait for resolution events.
///
/// Calls are made synchronously on the resolving task; keep them cheap.
///
/// # Examples
///
/// ```
/// use ferrous_web::{DiObserver, Key, ServiceCollection, Resolver};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Counting(AtomicUsize);
///
/// impl DiObserver for Counting {
///     fn resolved(&self, _key: &Key, _duration: Duration) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let counter = Arc::new(Counting::default());
/// let mut services = ServiceCollection::new();
/// services.add_singleton(5u8);
/// services.add_observer(counter.clone());
///
/// let provider = services.build();
/// provider.get::<u8>().unwrap();
/// assert_eq!(counter.0.load(Ordering::SeqCst), 1);
/// ```
pub trait DiObserver: Send + Sync {
    /// Called before the capability is looked up.
    fn resolving(&self, _key: &Key) {}

    /// Called after a successful resolution.
    fn resolved(&self, _key: &Key, _duration: Duration) {}

    /// Called when resolution fails, including failures of nested capabilities.
    fn failed(&self, _key: &Key, _error: &DiError) {}
}

#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    /// Runs `resolve`, notifying every observer around it.
    #[inline]
    pub(crate) fn observe<T, F>(&self, key: &Key, resolve: F) -> DiResult<T>
    where
        F: FnOnce() -> DiResult<T>,
    {
        if !self.has_observers() {
            return resolve();
        }

        for observer in &self.observers {
            observer.resolving(key);
        }
        let start = Instant::now();
        let result = resolve();
        match &result {
            Ok(_) => {
                let elapsed = start.elapsed();
                for observer in &self.observers {
                    observer.resolved(key, elapsed);
                }
            }
            Err(e) => {
                for observer in &self.observers {
                    observer.failed(key, e);
                }
            }
        }
        result
    }
}

/// Built-in observer that emits `tracing` events.
///
/// Resolutions are logged at `trace`, failures at `debug`; the dispatcher
/// already logs request-level failures at `error`.
///
/// # Examples
///
/// ```
/// use ferrous_web::{ServiceCollection, TracingObserver};
/// use std::sync::Arc;
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(TracingObserver::new()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    slow_threshold: Option<Duration>,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolutions slower than `threshold` are logged at `warn`.
    pub fn with_slow_threshold(threshold: Duration) -> Self {
        Self {
            slow_threshold: Some(threshold),
        }
    }
}

impl DiObserver for TracingObserver {
    fn resolving(&self, key: &Key) {
        tracing::trace!(capability = key.display_name(), "resolving");
    }

    fn resolved(&self, key: &Key, duration: Duration) {
        match self.slow_threshold {
            Some(threshold) if duration > threshold => tracing::warn!(
                capability = key.display_name(),
                elapsed = ?duration,
                "slow resolution"
            ),
            _ => tracing::trace!(capability = key.display_name(), elapsed = ?duration, "resolved"),
        }
    }

    fn failed(&self, key: &Key, error: &DiError) {
        tracing::debug!(capability = key.display_name(), %error, "resolution failed");
    }
}
