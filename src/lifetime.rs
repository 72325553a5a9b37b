//! Capability lifetime definitions.

/// Lifetimes controlling instance caching behavior
///
/// # Examples
///
/// ```rust
/// use ferrous_web::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Repository { db_url: String }
/// struct RequestModel { id: u32 }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
/// services.add_scoped_factory::<Repository, _>(|r| {
///     let db = r.get::<Database>()?;
///     Ok(Repository { db_url: db.url.clone() })
/// });
/// services.add_transient_factory::<RequestModel, _>(|_| Ok(RequestModel { id: 7 }));
///
/// let provider = services.build();
///
/// let scope1 = provider.create_scope();
/// let repo1a = scope1.get::<Repository>().unwrap();
/// let repo1b = scope1.get::<Repository>().unwrap();
/// assert!(Arc::ptr_eq(&repo1a, &repo1b));
///
/// let scope2 = provider.create_scope();
/// let repo2 = scope2.get::<Repository>().unwrap();
/// assert!(!Arc::ptr_eq(&repo1a, &repo2));
///
/// let m1 = scope1.get::<RequestModel>().unwrap();
/// let m2 = scope1.get::<RequestModel>().unwrap();
/// assert!(!Arc::ptr_eq(&m1, &m2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Single instance per root provider, cached for the process lifetime.
    ///
    /// Construction runs against the root provider, so a singleton can never
    /// capture a scoped capability.
    Singleton,
    /// Single instance per resolution scope (one scope per request),
    /// released when the scope is released.
    Scoped,
    /// New instance per resolution, never cached.
    Transient,
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Lifetime::Singleton => "singleton",
            Lifetime::Scoped => "scoped",
            Lifetime::Transient => "transient",
        })
    }
}
