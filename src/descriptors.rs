//! Registration descriptors for introspection and diagnostics.

use crate::key::Key;
use crate::lifetime::Lifetime;

/// Snapshot of one container registration.
///
/// # Examples
///
/// ```rust
/// use ferrous_web::{Lifetime, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Repository;
///
/// trait Logger: Send + Sync {}
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {}
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
/// services.add_scoped_factory::<Repository, _>(|_| Ok(Repository));
/// services.add_singleton_trait(Arc::new(ConsoleLogger) as Arc<dyn Logger>);
///
/// let descriptors = services.descriptors();
/// assert_eq!(descriptors.len(), 3);
///
/// let repo = descriptors.iter().find(|d| d.type_name().contains("Repository")).unwrap();
/// assert_eq!(repo.lifetime, Lifetime::Scoped);
/// assert!(!repo.is_trait());
///
/// let logger = descriptors.iter().find(|d| d.is_trait()).unwrap();
/// assert_eq!(logger.lifetime, Lifetime::Singleton);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub key: Key,
    pub lifetime: Lifetime,
    /// Concrete type backing the registration, when known
    pub impl_type_name: Option<&'static str>,
}

impl ServiceDescriptor {
    /// Type or trait name of the capability.
    pub fn type_name(&self) -> &'static str {
        self.key.display_name()
    }

    pub fn is_trait(&self) -> bool {
        self.key.is_trait()
    }
}

impl std::fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.type_name(), self.lifetime)?;
        if let Some(imp) = self.impl_type_name {
            if imp != self.type_name() {
                write!(f, " -> {}", imp)?;
            }
        }
        Ok(())
    }
}
