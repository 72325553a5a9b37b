//! Startup pre-warming of capabilities.
//!
//! Capabilities marked with [`ServiceCollection::prewarm`] are resolved once
//! when the application is sealed. A missing registration, a cycle or a
//! failing factory then aborts startup instead of the first request.
//!
//! [`ServiceCollection::prewarm`]: crate::ServiceCollection::prewarm

use crate::key::{key_of_trait, key_of_type, Key};

/// Ordered, de-duplicated set of capabilities to resolve at startup.
#[derive(Default, Clone)]
pub(crate) struct PrewarmSet {
    keys: Vec<Key>,
}

impl PrewarmSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_type<T: 'static + Send + Sync>(&mut self) {
        self.add(key_of_type::<T>());
    }

    pub(crate) fn add_trait<T: ?Sized + 'static + Send + Sync>(&mut self) {
        self.add(key_of_trait::<T>());
    }

    fn add(&mut self, key: Key) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
