//! Service provider module for dependency injection.
//!
//! This module contains the ServiceProvider (the root resolver, owner of
//! singletons) and the per-request [`Scope`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{DiError, DiResult};
use crate::internal::{BoxFutureUnit, ChainLink, DisposeBag, SingletonBuilds};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::observer::Observers;
use crate::prewarm::PrewarmSet;
use crate::registration::{AnyArc, Registration, Registry};
use crate::traits::ResolverCore;

pub mod context;
pub mod scope;
pub use context::ResolverContext;
pub use scope::Scope;

/// Root resolver for the dependency injection container.
///
/// Resolves singletons and transients; scoped capabilities need a
/// [`Scope`]. Cloning is cheap and every clone shares the same singleton
/// cache.
///
/// # Thread Safety
///
/// After the provider is built the registry is read-only. Singleton first
/// construction goes through a `OnceCell`, so concurrent first resolutions
/// build exactly one instance and later reads take no lock.
///
/// # Examples
///
/// ```
/// use ferrous_web::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton(Database { url: "postgres://localhost".to_string() });
/// collection.add_transient_factory::<UserService, _>(|resolver| {
///     Ok(UserService { db: resolver.get::<Database>()? })
/// });
///
/// let provider = collection.build();
/// let user_service = provider.get::<UserService>().unwrap();
/// assert_eq!(user_service.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    pub(crate) registry: Registry,
    pub(crate) root_disposers: Mutex<DisposeBag>,
    pub(crate) observers: Observers,
    pub(crate) singleton_builds: SingletonBuilds,
}

impl ServiceProvider {
    pub(crate) fn new(registry: Registry, observers: Observers) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                registry,
                root_disposers: Mutex::new(DisposeBag::default()),
                observers,
                singleton_builds: SingletonBuilds::default(),
            }),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ProviderInner {
        &self.inner
    }

    /// Creates a new resolution scope.
    ///
    /// Each scope caches its own scoped instances and shares singletons with
    /// the root. Release it with [`Scope::release`] when the unit of work
    /// (usually a request) completes.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_web::{ServiceCollection, Resolver};
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// struct RequestId(usize);
    ///
    /// let counter = Arc::new(AtomicUsize::new(0));
    /// let c = counter.clone();
    /// let mut collection = ServiceCollection::new();
    /// collection.add_scoped_factory::<RequestId, _>(move |_| {
    ///     Ok(RequestId(c.fetch_add(1, Ordering::SeqCst)))
    /// });
    ///
    /// let provider = collection.build();
    /// let scope1 = provider.create_scope();
    /// let scope2 = provider.create_scope();
    ///
    /// let a = scope1.get::<RequestId>().unwrap();
    /// let b = scope1.get::<RequestId>().unwrap();
    /// let c = scope2.get::<RequestId>().unwrap();
    /// assert!(Arc::ptr_eq(&a, &b));
    /// assert!(!Arc::ptr_eq(&a, &c));
    /// ```
    pub fn create_scope(&self) -> Scope {
        Scope::new(self.clone())
    }

    /// Runs every root release hook (singletons), async hooks first, LIFO.
    pub async fn dispose_all(&self) {
        let bag = std::mem::take(&mut *self.inner.root_disposers.lock());
        bag.run_all().await;
    }

    /// Resolves every capability in `set` once, failing on the first error.
    ///
    /// Used at startup so unresolvable or cyclic graphs abort composition
    /// instead of failing the first request. Scoped capabilities are checked
    /// in a throwaway scope that is released before returning.
    pub(crate) async fn prewarm(&self, set: &PrewarmSet) -> DiResult<()> {
        let scope = self.create_scope();
        let mut outcome = Ok(());
        for key in set.keys() {
            if let Err(e) = scope.resolve_any(key) {
                outcome = Err(e);
                break;
            }
        }
        scope.release().await;
        outcome
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.inner.registry.contains_key(key)
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut s = String::new();
        s.push_str("=== Service Provider Debug ===\n");
        for (k, r) in self.inner.registry.iter() {
            s.push_str(&format!("  {}: {}\n", k.display_name(), r.lifetime));
        }
        s
    }

    /// Singleton resolution through the registration's `OnceCell`.
    ///
    /// Concurrent first resolutions wait for the thread already building;
    /// a wait that would close a cycle across threads fails as
    /// [`DiError::Circular`].
    ///
    /// The factory runs against the root provider, never a scope.
    #[inline(always)]
    pub(crate) fn resolve_singleton(
        &self,
        reg: &Registration,
        link: &ChainLink<'_>,
    ) -> DiResult<AnyArc> {
        match &reg.single_runtime {
            Some(cell) => {
                if let Some(value) = cell.get() {
                    return Ok(value.clone());
                }
                self.inner.singleton_builds.get_or_build(cell, link, || {
                    let ctx = ResolverContext::new(self, link);
                    (reg.ctor)(&ctx)
                })
            }
            None => {
                let ctx = ResolverContext::new(self, link);
                (reg.ctor)(&ctx)
            }
        }
    }

    /// True if a singleton encloses `link` in the resolution chain.
    fn building_singleton(&self, link: &ChainLink<'_>) -> bool {
        link.ancestors().any(|key| {
            self.inner
                .registry
                .get(key)
                .is_some_and(|reg| reg.lifetime == Lifetime::Singleton)
        })
    }

    fn resolve_any_impl(&self, link: &ChainLink<'_>) -> DiResult<AnyArc> {
        let key = link.key();
        let reg = self.inner.registry.get(key).ok_or_else(|| link.not_found())?;
        match reg.lifetime {
            Lifetime::Singleton => self.resolve_singleton(reg, link),
            Lifetime::Scoped => Err(DiError::WrongLifetime {
                name: key.display_name(),
                reason: if self.building_singleton(link) {
                    "scoped capability requested while building a singleton"
                } else {
                    "scoped capability requested from the root provider"
                },
            }),
            Lifetime::Transient => {
                let ctx = ResolverContext::new(self, link);
                (reg.ctor)(&ctx)
            }
        }
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve_linked(&self, key: &Key, parent: Option<&ChainLink<'_>>) -> DiResult<AnyArc> {
        let link = ChainLink::enter(key, parent)?;
        self.inner
            .observers
            .observe(key, || self.resolve_any_impl(&link))
    }

    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.inner.root_disposers.lock().push_sync(f);
    }

    fn push_async_disposer(&self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>) {
        self.inner.root_disposers.lock().push_async(f);
    }
}

impl Drop for ProviderInner {
    fn drop(&mut self) {
        let bag = self.root_disposers.get_mut();
        if !bag.is_empty() {
            tracing::warn!(
                pending = bag.len(),
                "service provider dropped with unreleased singletons; call dispose_all().await first"
            );
        }
    }
}
