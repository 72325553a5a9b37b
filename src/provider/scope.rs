//! Scoped resolution and request lifecycle management.
//!
//! A [`Scope`] lives for one unit of work. It caches scoped instances,
//! holds per-request seeded values, and owns the release hooks of
//! everything it built.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::{ResolverContext, ServiceProvider};
use crate::error::DiResult;
use crate::internal::{BoxFutureUnit, ChainLink, DisposeBag};
use crate::key::{key_of_trait, key_of_type, Key};
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, Registration};
use crate::traits::ResolverCore;

/// Scoped container for request-scoped resolution.
///
/// # Lifetime Behavior
///
/// - **Singleton**: resolved and cached in the root provider
/// - **Scoped**: resolved and cached within this scope
/// - **Transient**: built fresh on every resolution
///
/// Values seeded with [`insert_instance`](Self::insert_instance) shadow the
/// registry for this scope only.
///
/// # Examples
///
/// ```
/// use ferrous_web::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct DatabaseConnection(String);
/// struct UserService { db: Arc<DatabaseConnection> }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_scoped_factory::<DatabaseConnection, _>(|_| {
///     Ok(DatabaseConnection("connection-123".to_string()))
/// });
/// collection.add_transient_factory::<UserService, _>(|resolver| {
///     Ok(UserService { db: resolver.get::<DatabaseConnection>()? })
/// });
///
/// let provider = collection.build();
/// let scope = provider.create_scope();
///
/// let user1 = scope.get::<UserService>().unwrap();
/// let user2 = scope.get::<UserService>().unwrap();
/// assert!(Arc::ptr_eq(&user1.db, &user2.db));
/// ```
pub struct Scope {
    root: ServiceProvider,
    scoped_cells: Box<[OnceCell<AnyArc>]>,
    locals: Mutex<HashMap<Key, AnyArc>>,
    disposers: Mutex<DisposeBag>,
    released: AtomicBool,
}

impl Scope {
    pub(crate) fn new(root: ServiceProvider) -> Self {
        let scoped_count = root.inner().registry.scoped_count;
        let scoped_cells = (0..scoped_count)
            .map(|_| OnceCell::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            root,
            scoped_cells,
            locals: Mutex::new(HashMap::new()),
            disposers: Mutex::new(DisposeBag::default()),
            released: AtomicBool::new(false),
        }
    }

    /// The root provider this scope was created from.
    pub fn provider(&self) -> &ServiceProvider {
        &self.root
    }

    /// Seeds a concrete value visible only to this scope.
    ///
    /// Resolution checks seeded values before the registry, so this also
    /// shadows any registration of `T`.
    ///
    /// ```
    /// use ferrous_web::{ServiceCollection, Resolver};
    ///
    /// struct TenantId(&'static str);
    ///
    /// let provider = ServiceCollection::new().build();
    /// let scope = provider.create_scope();
    /// scope.insert_instance(TenantId("acme"));
    /// assert_eq!(scope.get::<TenantId>().unwrap().0, "acme");
    /// assert!(provider.get::<TenantId>().is_err());
    /// ```
    pub fn insert_instance<T: Send + Sync + 'static>(&self, value: T) -> Arc<T> {
        let arc = Arc::new(value);
        self.locals
            .lock()
            .insert(key_of_type::<T>(), arc.clone() as AnyArc);
        arc
    }

    /// Seeds a trait implementation visible only to this scope.
    pub fn insert_trait_instance<T: ?Sized + Send + Sync + 'static>(&self, value: Arc<T>) {
        self.locals
            .lock()
            .insert(key_of_trait::<T>(), Arc::new(value) as AnyArc);
    }

    /// A value seeded with [`insert_instance`](Self::insert_instance), ignoring
    /// the registry.
    pub fn try_get_local<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.locals
            .lock()
            .get(&key_of_type::<T>())
            .and_then(|v| v.clone().downcast::<T>().ok())
    }

    /// Whether [`release`](Self::release) has already run.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Runs every release hook registered in this scope, exactly once.
    ///
    /// Async hooks run first, then sync hooks, each last-registered first.
    /// Later calls are no-ops.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let bag = std::mem::take(&mut *self.disposers.lock());
        if !bag.is_empty() {
            tracing::trace!(hooks = bag.len(), "releasing scope");
        }
        bag.run_all().await;
    }

    /// Scoped resolution through the slot's `OnceCell`.
    #[inline(always)]
    fn resolve_scoped(&self, reg: &Registration, link: &ChainLink<'_>) -> DiResult<AnyArc> {
        let build = || {
            let ctx = ResolverContext::new(self, link);
            (reg.ctor)(&ctx)
        };
        match reg.scoped_slot {
            Some(slot) => {
                let cell = &self.scoped_cells[slot];
                if let Some(value) = cell.get() {
                    return Ok(value.clone());
                }
                cell.get_or_try_init(build).cloned()
            }
            None => build(),
        }
    }

    fn resolve_any_impl(&self, link: &ChainLink<'_>) -> DiResult<AnyArc> {
        let key = link.key();
        if let Some(seeded) = self.locals.lock().get(key) {
            return Ok(seeded.clone());
        }

        let reg = self
            .root
            .inner()
            .registry
            .get(key)
            .ok_or_else(|| link.not_found())?;
        match reg.lifetime {
            Lifetime::Singleton => self.root.resolve_singleton(reg, link),
            Lifetime::Scoped => self.resolve_scoped(reg, link),
            Lifetime::Transient => {
                let ctx = ResolverContext::new(self, link);
                (reg.ctor)(&ctx)
            }
        }
    }
}

impl ResolverCore for Scope {
    fn resolve_linked(&self, key: &Key, parent: Option<&ChainLink<'_>>) -> DiResult<AnyArc> {
        let link = ChainLink::enter(key, parent)?;
        self.root
            .inner()
            .observers
            .observe(key, || self.resolve_any_impl(&link))
    }

    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.disposers.lock().push_sync(f);
    }

    fn push_async_disposer(&self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>) {
        self.disposers.lock().push_async(f);
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if *self.released.get_mut() {
            return;
        }
        let bag = std::mem::take(self.disposers.get_mut());
        if bag.is_empty() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(bag.run_all());
            }
            Err(_) => {
                let mut bag = bag;
                if bag.has_async() {
                    tracing::warn!(
                        "scope dropped outside a tokio runtime; async release hooks skipped"
                    );
                }
                bag.run_all_sync_reverse();
            }
        }
    }
}
