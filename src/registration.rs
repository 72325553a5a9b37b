//! Capability registration types.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::DiResult;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::provider::ResolverContext;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Ctor =
    Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// Registration with lifetime and constructor
pub(crate) struct Registration {
    pub(crate) lifetime: Lifetime,
    pub(crate) ctor: Ctor,
    /// Concrete type backing the registration, when known
    pub(crate) impl_name: Option<&'static str>,
    /// Singleton cache, filled by the thread that claimed construction
    pub(crate) single_runtime: Option<OnceCell<AnyArc>>,
    /// Slot in each scope's cell array, assigned by `Registry::finalize`
    pub(crate) scoped_slot: Option<usize>,
}

impl Registration {
    pub(crate) fn new(lifetime: Lifetime, ctor: Ctor, impl_name: Option<&'static str>) -> Self {
        let single_runtime = match lifetime {
            Lifetime::Singleton => Some(OnceCell::new()),
            _ => None,
        };

        Self {
            lifetime,
            ctor,
            impl_name,
            single_runtime,
            scoped_slot: None,
        }
    }
}

/// Registry holding all registrations, keyed by capability.
///
/// Insertion keeps first-registration order for diagnostics; a later
/// registration for the same key replaces the earlier one in place.
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<Key, Registration>,
    order: Vec<Key>,
    pub(crate) scoped_count: usize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a registration, returning true if it replaced an existing one.
    pub(crate) fn insert(&mut self, key: Key, registration: Registration) -> bool {
        let replaced = self.entries.insert(key, registration).is_some();
        if !replaced {
            self.order.push(key);
        }
        replaced
    }

    #[inline(always)]
    pub(crate) fn get(&self, key: &Key) -> Option<&Registration> {
        self.entries.get(key)
    }

    #[inline(always)]
    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates in first-registration order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Key, &Registration)> {
        self.order
            .iter()
            .filter_map(move |k| self.entries.get_key_value(k))
    }

    /// Assigns scoped slot indices. Called once when the provider is built.
    pub(crate) fn finalize(&mut self) {
        let mut next_scoped_slot = 0;
        for key in &self.order {
            if let Some(reg) = self.entries.get_mut(key) {
                if reg.lifetime == Lifetime::Scoped {
                    reg.scoped_slot = Some(next_scoped_slot);
                    next_scoped_slot += 1;
                }
            }
        }
        self.scoped_count = next_scoped_slot;
    }
}
