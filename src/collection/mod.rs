//! Service collection module for dependency injection.
//!
//! This module contains the ServiceCollection type, used to register
//! capabilities before building a [`ServiceProvider`].

use std::sync::Arc;

use crate::descriptors::ServiceDescriptor;
use crate::error::DiResult;
use crate::key::{key_of_trait, key_of_type, Key};
use crate::lifetime::Lifetime;
use crate::observer::{DiObserver, Observers};
use crate::prewarm::PrewarmSet;
use crate::provider::{ResolverContext, ServiceProvider};
use crate::registration::{AnyArc, Ctor, Registration, Registry};
use crate::traits::{AsyncDispose, Dispose, Resolver};

/// Registration surface of the container.
///
/// Re-registering a capability replaces the earlier registration (last write
/// wins); the replacement is logged at `debug`. Use the `try_add_*` variants
/// to register defaults that callers may already have overridden.
///
/// # Examples
///
/// ```rust
/// use ferrous_web::{ServiceCollection, Resolver};
///
/// struct Config { greeting: &'static str }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Config { greeting: "hello" });
/// services.add_transient_factory::<String, _>(|r| {
///     Ok(format!("{}, world", r.get::<Config>()?.greeting))
/// });
///
/// let provider = services.build();
/// assert_eq!(&*provider.get::<String>().unwrap(), "hello, world");
/// ```
#[derive(Default)]
pub struct ServiceCollection {
    registry: Registry,
    observers: Observers,
    prewarm: PrewarmSet,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            observers: Observers::new(),
            prewarm: PrewarmSet::new(),
        }
    }

    // ----- Concrete Type Registrations -----

    /// Registers a fixed instance shared by the whole application.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_web::ServiceCollection;
    /// struct Config {
    ///     database_url: String
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Config {
    ///     database_url: "postgres://localhost".to_string()
    /// });
    /// ```
    pub fn add_singleton<T: 'static + Send + Sync>(&mut self, value: T) -> &mut Self {
        let arc: AnyArc = Arc::new(value);
        let ctor: Ctor = Arc::new(move |_: &ResolverContext<'_>| -> DiResult<AnyArc> {
            Ok(arc.clone())
        });
        self.insert(
            key_of_type::<T>(),
            Registration::new(Lifetime::Singleton, ctor, Some(std::any::type_name::<T>())),
        );
        self
    }

    /// Registers a singleton factory, run once on first request.
    ///
    /// The factory is always run against the root provider, so it cannot
    /// capture scoped capabilities.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_web::{DiError, ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Database { url: String }
    /// struct RequestId(u64);
    /// struct Cache { db: Arc<Database> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Database { url: "postgres://localhost".to_string() });
    /// services.add_scoped_factory::<RequestId, _>(|_| Ok(RequestId(7)));
    /// services.add_singleton_factory::<Cache, _>(|r| Ok(Cache { db: r.get::<Database>()? }));
    /// services.add_singleton_factory::<String, _>(|r| {
    ///     Ok(r.get::<RequestId>()?.0.to_string())
    /// });
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope();
    /// assert!(scope.get::<Cache>().is_ok());
    /// assert!(matches!(scope.get::<String>(), Err(DiError::WrongLifetime { .. })));
    /// ```
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, factory)
    }

    /// Registers a scoped factory: one instance per scope.
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, factory)
    }

    /// Registers a transient factory: a new instance on every request.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Transient, factory)
    }

    fn add_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |ctx: &ResolverContext<'_>| -> DiResult<AnyArc> {
            let value = factory(ctx)?;
            Ok(Arc::new(value) as AnyArc)
        });
        self.insert(
            key_of_type::<T>(),
            Registration::new(lifetime, ctor, Some(std::any::type_name::<T>())),
        );
        self
    }

    // ----- Trait Registrations -----

    /// Registers a trait implementation shared by the whole application.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_web::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// trait Logger: Send + Sync {
    ///     fn log(&self, message: &str);
    /// }
    ///
    /// struct StderrLogger;
    /// impl Logger for StderrLogger {
    ///     fn log(&self, message: &str) { eprintln!("{message}"); }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_trait::<dyn Logger>(Arc::new(StderrLogger));
    /// let provider = services.build();
    /// provider.get_trait::<dyn Logger>().unwrap().log("ready");
    /// ```
    pub fn add_singleton_trait<T>(&mut self, value: Arc<T>) -> &mut Self
    where
        T: ?Sized + 'static + Send + Sync,
    {
        // Stored as Arc<Arc<dyn Trait>> inside the type-erased slot
        let any_arc: AnyArc = Arc::new(value);
        let ctor: Ctor = Arc::new(move |_: &ResolverContext<'_>| -> DiResult<AnyArc> {
            Ok(any_arc.clone())
        });
        self.insert(
            key_of_trait::<T>(),
            Registration::new(Lifetime::Singleton, ctor, None),
        );
        self
    }

    pub fn add_singleton_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        self.add_trait_factory(Lifetime::Singleton, factory)
    }

    /// Registers a scoped trait factory.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use ferrous_web::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// trait Tenant: Send + Sync {
    ///     fn id(&self) -> &str;
    /// }
    ///
    /// struct HeaderTenant(String);
    /// impl Tenant for HeaderTenant {
    ///     fn id(&self) -> &str { &self.0 }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_trait_factory::<dyn Tenant, _>(|_| {
    ///     Ok(Arc::new(HeaderTenant("acme".into())))
    /// });
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope();
    /// let a = scope.get_trait::<dyn Tenant>().unwrap();
    /// let b = scope.get_trait::<dyn Tenant>().unwrap();
    /// assert!(Arc::ptr_eq(&a, &b));
    /// assert_eq!(a.id(), "acme");
    /// ```
    pub fn add_scoped_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        self.add_trait_factory(Lifetime::Scoped, factory)
    }

    pub fn add_transient_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        self.add_trait_factory(Lifetime::Transient, factory)
    }

    fn add_trait_factory<Trait, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |ctx: &ResolverContext<'_>| -> DiResult<AnyArc> {
            let value = factory(ctx)?;
            Ok(Arc::new(value) as AnyArc)
        });
        self.insert(key_of_trait::<Trait>(), Registration::new(lifetime, ctor, None));
        self
    }

    // ----- Disposable Registrations -----

    /// Registers a scoped factory whose instances are released with their scope.
    pub fn add_scoped_disposable<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Dispose,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_disposable(Lifetime::Scoped, factory)
    }

    /// Registers a singleton factory whose instance is released by
    /// [`ServiceProvider::dispose_all`].
    pub fn add_singleton_disposable<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Dispose,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_disposable(Lifetime::Singleton, factory)
    }

    fn add_disposable<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Dispose,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |ctx: &ResolverContext<'_>| -> DiResult<AnyArc> {
            let value = Arc::new(factory(ctx)?);
            ctx.register_disposer(value.clone());
            Ok(value as AnyArc)
        });
        self.insert(
            key_of_type::<T>(),
            Registration::new(lifetime, ctor, Some(std::any::type_name::<T>())),
        );
        self
    }

    /// Scoped variant of [`add_scoped_disposable`](Self::add_scoped_disposable)
    /// for [`AsyncDispose`] capabilities.
    ///
    /// ```
    /// use ferrous_web::{AsyncDispose, ServiceCollection, Resolver};
    /// use async_trait::async_trait;
    /// use std::sync::atomic::{AtomicBool, Ordering};
    /// use std::sync::Arc;
    ///
    /// static CLOSED: AtomicBool = AtomicBool::new(false);
    ///
    /// struct Connection;
    ///
    /// #[async_trait]
    /// impl AsyncDispose for Connection {
    ///     async fn dispose(&self) {
    ///         CLOSED.store(true, Ordering::SeqCst);
    ///     }
    /// }
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_async_disposable::<Connection, _>(|_| Ok(Connection));
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope();
    /// scope.get::<Connection>().unwrap();
    /// scope.release().await;
    /// assert!(CLOSED.load(Ordering::SeqCst));
    /// # }
    /// ```
    pub fn add_scoped_async_disposable<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: AsyncDispose,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_async_disposable(Lifetime::Scoped, factory)
    }

    pub fn add_singleton_async_disposable<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: AsyncDispose,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_async_disposable(Lifetime::Singleton, factory)
    }

    fn add_async_disposable<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: AsyncDispose,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |ctx: &ResolverContext<'_>| -> DiResult<AnyArc> {
            let value = Arc::new(factory(ctx)?);
            ctx.register_async_disposer(value.clone());
            Ok(value as AnyArc)
        });
        self.insert(
            key_of_type::<T>(),
            Registration::new(lifetime, ctor, Some(std::any::type_name::<T>())),
        );
        self
    }

    // ----- Conditional Registrations -----

    /// Registers `value` only if `T` is not registered yet. Returns whether it was added.
    ///
    /// ```rust
    /// # use ferrous_web::{ServiceCollection, Resolver};
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(8080u16);
    /// assert!(!services.try_add_singleton(3000u16));
    /// assert_eq!(*services.build().get::<u16>().unwrap(), 8080);
    /// ```
    pub fn try_add_singleton<T: 'static + Send + Sync>(&mut self, value: T) -> bool {
        if self.contains_type::<T>() {
            return false;
        }
        self.add_singleton(value);
        true
    }

    pub fn try_add_singleton_factory<T, F>(&mut self, factory: F) -> bool
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.try_add_factory(Lifetime::Singleton, factory)
    }

    pub fn try_add_scoped_factory<T, F>(&mut self, factory: F) -> bool
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.try_add_factory(Lifetime::Scoped, factory)
    }

    pub fn try_add_transient_factory<T, F>(&mut self, factory: F) -> bool
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        self.try_add_factory(Lifetime::Transient, factory)
    }

    fn try_add_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> bool
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<T> + Send + Sync + 'static,
    {
        if self.contains_type::<T>() {
            return false;
        }
        self.add_factory(lifetime, factory);
        true
    }

    pub fn try_add_singleton_trait<T>(&mut self, value: Arc<T>) -> bool
    where
        T: ?Sized + 'static + Send + Sync,
    {
        if self.contains_trait::<T>() {
            return false;
        }
        self.add_singleton_trait(value);
        true
    }

    pub fn try_add_scoped_trait_factory<Trait, F>(&mut self, factory: F) -> bool
    where
        Trait: ?Sized + 'static + Send + Sync,
        F: Fn(&ResolverContext) -> DiResult<Arc<Trait>> + Send + Sync + 'static,
    {
        if self.contains_trait::<Trait>() {
            return false;
        }
        self.add_trait_factory(Lifetime::Scoped, factory);
        true
    }

    // ----- Introspection -----

    pub fn contains_type<T: 'static>(&self) -> bool {
        self.registry.contains_key(&key_of_type::<T>())
    }

    pub fn contains_trait<T: ?Sized + 'static>(&self) -> bool {
        self.registry.contains_key(&key_of_trait::<T>())
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }

    /// Lists registrations in first-registration order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.registry
            .iter()
            .map(|(key, reg)| ServiceDescriptor {
                key: *key,
                lifetime: reg.lifetime,
                impl_type_name: reg.impl_name,
            })
            .collect()
    }

    /// Adds a resolution observer. See [`DiObserver`].
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Marks `T` for resolution at startup.
    ///
    /// Only [`build_ready`](Self::build_ready) (and `App::seal`, which uses
    /// it) resolve marked capabilities; plain [`build`](Self::build) ignores
    /// the marks.
    ///
    /// ```
    /// use ferrous_web::{DiError, ServiceCollection};
    ///
    /// struct Pool;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_factory::<Pool, _>(|_| Err(DiError::factory::<Pool>("refused")));
    /// services.prewarm::<Pool>();
    ///
    /// assert!(matches!(services.build_ready().await, Err(DiError::Factory { .. })));
    /// # }
    /// ```
    pub fn prewarm<T: 'static + Send + Sync>(&mut self) -> &mut Self {
        self.prewarm.add_type::<T>();
        self
    }

    pub fn prewarm_trait<T: ?Sized + 'static + Send + Sync>(&mut self) -> &mut Self {
        self.prewarm.add_trait::<T>();
        self
    }

    /// Builds the service provider from this collection.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_web::{ServiceCollection, Resolver};
    ///
    /// let mut collection = ServiceCollection::new();
    /// collection.add_singleton(42usize);
    /// collection.add_transient_factory::<String, _>(|_| Ok("Hello".to_string()));
    ///
    /// let provider = collection.build();
    /// assert_eq!(*provider.get::<usize>().unwrap(), 42);
    /// assert_eq!(&*provider.get::<String>().unwrap(), "Hello");
    /// ```
    pub fn build(self) -> ServiceProvider {
        self.build_parts().0
    }

    /// Builds the provider and resolves every capability marked with
    /// [`prewarm`](Self::prewarm), failing on the first error.
    pub async fn build_ready(self) -> DiResult<ServiceProvider> {
        let (provider, prewarm) = self.build_parts();
        if !prewarm.is_empty() {
            provider.prewarm(&prewarm).await?;
        }
        Ok(provider)
    }

    fn build_parts(mut self) -> (ServiceProvider, PrewarmSet) {
        self.registry.finalize();
        tracing::debug!(registrations = self.registry.len(), "service provider built");
        (
            ServiceProvider::new(self.registry, self.observers),
            self.prewarm,
        )
    }

    fn insert(&mut self, key: Key, registration: Registration) {
        let lifetime = registration.lifetime;
        if self.registry.insert(key, registration) {
            tracing::debug!(
                capability = key.display_name(),
                %lifetime,
                "registration replaced; last write wins"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_keeps_original_position() {
        let mut services = ServiceCollection::new();
        services.add_singleton(1u8);
        services.add_singleton(2u16);
        services.add_scoped_factory::<u8, _>(|_| Ok(3));

        let descriptors = services.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].type_name(), "u8");
        assert_eq!(descriptors[0].lifetime, Lifetime::Scoped);
    }

    #[test]
    fn try_add_trait_respects_existing() {
        trait Greeter: Send + Sync {
            fn hi(&self) -> &'static str;
        }
        struct En;
        struct Fr;
        impl Greeter for En {
            fn hi(&self) -> &'static str {
                "hi"
            }
        }
        impl Greeter for Fr {
            fn hi(&self) -> &'static str {
                "salut"
            }
        }

        let mut services = ServiceCollection::new();
        assert!(services.try_add_singleton_trait::<dyn Greeter>(Arc::new(En)));
        assert!(!services.try_add_scoped_trait_factory::<dyn Greeter, _>(|_| Ok(Arc::new(Fr))));

        let provider = services.build();
        assert_eq!(provider.get_trait::<dyn Greeter>().unwrap().hi(), "hi");
    }
}
