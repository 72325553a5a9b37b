//! Resolver context handed to factory functions.

use crate::error::DiResult;
use crate::internal::{BoxFutureUnit, ChainLink};
use crate::key::Key;
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

/// Context passed to factory functions for resolving dependencies.
///
/// Wraps the resolver that owns the instance being built (the root provider
/// for singletons, the request scope otherwise) together with the
/// in-progress resolution chain, so nested resolutions are checked for
/// cycles against it.
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
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
/// services.add_transient_factory::<UserService, _>(|resolver| {
///     Ok(UserService { db: resolver.get::<Database>()? })
/// });
///
/// let provider = services.build();
/// assert_eq!(provider.get::<UserService>().unwrap().db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    resolver: &'a dyn ResolverCore,
    chain: &'a ChainLink<'a>,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(resolver: &'a dyn ResolverCore, chain: &'a ChainLink<'a>) -> Self {
        Self { resolver, chain }
    }

    /// Capability currently being constructed.
    pub fn building(&self) -> &Key {
        self.chain.key()
    }

    /// Resolution chain, outermost first, ending with the capability being built.
    pub fn chain(&self) -> Vec<&'static str> {
        self.chain.path()
    }
}

impl<'a> ResolverCore for ResolverContext<'a> {
    fn resolve_linked(&self, key: &Key, parent: Option<&ChainLink<'_>>) -> DiResult<AnyArc> {
        self.resolver.resolve_linked(key, parent)
    }

    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.resolver.resolve_linked(key, Some(self.chain))
    }

    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.resolver.push_sync_disposer(f);
    }

    fn push_async_disposer(&self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>) {
        self.resolver.push_async_disposer(f);
    }
}
