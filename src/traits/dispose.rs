//! Release contracts for resource cleanup.

/// Synchronous release contract.
///
/// Implement this for capabilities that need structured teardown. Instances
/// registered through `add_scoped_disposable` (or that a factory hands to
/// [`Resolver::register_disposer`](crate::Resolver::register_disposer)) are
/// released when their owning scope or provider is released, last created
/// first.
///
/// # Examples
///
/// ```
/// use ferrous_web::{Dispose, ServiceCollection};
///
/// struct UnitOfWork;
///
/// impl Dispose for UnitOfWork {
///     fn dispose(&self) {
///         // roll back anything left uncommitted
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_disposable::<UnitOfWork, _>(|_| Ok(UnitOfWork));
/// ```
pub trait Dispose: Send + Sync + 'static {
    fn dispose(&self);
}

/// Asynchronous release contract.
///
/// Async hooks run before sync hooks when a scope is released.
///
/// # Examples
///
/// ```
/// use ferrous_web::{AsyncDispose, ServiceCollection};
/// use async_trait::async_trait;
///
/// struct Connection;
///
/// #[async_trait]
/// impl AsyncDispose for Connection {
///     async fn dispose(&self) {
///         // graceful close
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_async_disposable::<Connection, _>(|_| Ok(Connection));
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    async fn dispose(&self);
}
