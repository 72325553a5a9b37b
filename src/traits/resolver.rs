//! Resolver traits for capability resolution.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::internal::{BoxFutureUnit, ChainLink};
use crate::key::{key_of_trait, key_of_type, Key};
use crate::registration::AnyArc;
use crate::traits::{AsyncDispose, Dispose};

/// Object-safe resolution core.
///
/// Implemented by [`ServiceProvider`](crate::ServiceProvider),
/// [`Scope`](crate::Scope) and [`ResolverContext`](crate::ResolverContext).
/// Most callers use the generic [`Resolver`] methods instead.
pub trait ResolverCore: Send + Sync {
    /// Resolves `key`, continuing the resolution chain ending at `parent`.
    ///
    /// Top-level calls pass `None`; factories resolve through a
    /// [`ResolverContext`](crate::ResolverContext), which supplies its own
    /// chain.
    fn resolve_linked(&self, key: &Key, parent: Option<&ChainLink<'_>>) -> DiResult<AnyArc>;

    /// Resolves `key` as the start of a new chain.
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.resolve_linked(key, None)
    }

    /// Registers a synchronous release hook with the owner of this resolver.
    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>);

    /// Registers an asynchronous release hook with the owner of this resolver.
    fn push_async_disposer(&self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>);
}

/// Typed resolution API over [`ResolverCore`].
///
/// # Examples
///
/// ```
/// use ferrous_web::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// struct FixedClock;
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 { 1_700_000_000 }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(42usize);
/// services.add_singleton_trait::<dyn Clock>(Arc::new(FixedClock));
///
/// let provider = services.build();
/// assert_eq!(*provider.get::<usize>().unwrap(), 42);
/// assert_eq!(provider.get_trait::<dyn Clock>().unwrap().now(), 1_700_000_000);
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete capability.
    fn get<T: 'static + Send + Sync>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&key_of_type::<T>())?;
        any.downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a trait capability.
    ///
    /// Trait instances are stored as `Arc<Arc<dyn Trait>>` inside the
    /// type-erased slot.
    fn get_trait<T: ?Sized + 'static + Send + Sync>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&key_of_trait::<T>())?;
        any.downcast::<Arc<T>>()
            .map(|boxed| (*boxed).clone())
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a concrete capability, treating "not registered" as `None`.
    ///
    /// Only a missing `T` itself maps to `None`; a missing transitive
    /// dependency of `T` is still an error.
    fn try_get<T: 'static + Send + Sync>(&self) -> DiResult<Option<Arc<T>>> {
        match self.get::<T>() {
            Ok(v) => Ok(Some(v)),
            Err(DiError::NotFound { name, .. }) if name == std::any::type_name::<T>() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Releases `service` when the owner of this resolver is released.
    fn register_disposer<T>(&self, service: Arc<T>)
    where
        T: Dispose,
    {
        self.push_sync_disposer(Box::new(move || service.dispose()));
    }

    /// Releases `service` asynchronously when the owner is released.
    fn register_async_disposer<T>(&self, service: Arc<T>)
    where
        T: AsyncDispose,
    {
        self.push_async_disposer(Box::new(move || {
            Box::pin(async move { service.dispose().await })
        }));
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
