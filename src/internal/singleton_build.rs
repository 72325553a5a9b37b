//! Coordination of concurrent singleton construction.
//!
//! Each singleton under construction is owned by the thread running its
//! factory. Other threads wait for the owner to finish. Before waiting, a
//! thread follows the "waits on a key owned by" edges; if they lead back to
//! itself the wait could never end, and the resolution fails as a cycle.

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};

use crate::error::{DiError, DiResult};
use crate::internal::ChainLink;
use crate::key::Key;
use crate::registration::AnyArc;

#[derive(Default)]
struct BuildState {
    owners: HashMap<Key, ThreadId>,
    waiting: HashMap<ThreadId, Key>,
}

impl BuildState {
    /// Key owned by `me` that `thread` ends up waiting on, if any.
    fn closes_cycle(&self, mut thread: ThreadId, me: ThreadId) -> Option<Key> {
        for _ in 0..=self.waiting.len() {
            let wanted = self.waiting.get(&thread)?;
            let owner = *self.owners.get(wanted)?;
            if owner == me {
                return Some(*wanted);
            }
            thread = owner;
        }
        None
    }
}

#[derive(Default)]
pub(crate) struct SingletonBuilds {
    state: Mutex<BuildState>,
    finished: Condvar,
}

struct Claim<'a> {
    builds: &'a SingletonBuilds,
    key: Key,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.builds.state.lock().owners.remove(&self.key);
        self.builds.finished.notify_all();
    }
}

impl SingletonBuilds {
    /// Returns the value in `cell`, building it with `build` on this thread
    /// unless another thread is already doing so.
    ///
    /// A failed build leaves the cell empty; the next caller tries again.
    pub(crate) fn get_or_build<F>(
        &self,
        cell: &OnceCell<AnyArc>,
        link: &ChainLink<'_>,
        build: F,
    ) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        let key = *link.key();
        let me = thread::current().id();

        let mut state = self.state.lock();
        loop {
            if let Some(value) = cell.get() {
                return Ok(value.clone());
            }
            let Some(owner) = state.owners.get(&key).copied() else {
                break;
            };
            if owner == me {
                return Err(DiError::Circular(link.path()));
            }
            if let Some(closing) = state.closes_cycle(owner, me) {
                let mut path = link.path();
                path.push(closing.display_name());
                tracing::debug!(
                    capability = key.display_name(),
                    "singleton construction would wait on itself across threads"
                );
                return Err(DiError::Circular(path));
            }
            state.waiting.insert(me, key);
            self.finished.wait(&mut state);
            state.waiting.remove(&me);
        }
        state.owners.insert(key, me);
        drop(state);

        let _claim = Claim { builds: self, key };
        let value = build()?;
        Ok(cell.get_or_init(|| value).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::key_of_type;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct A;
    struct B;

    #[test]
    fn failed_build_releases_the_claim() {
        let builds = SingletonBuilds::default();
        let cell = OnceCell::new();
        let key = key_of_type::<A>();
        let link = ChainLink::enter(&key, None).unwrap();

        let err = builds
            .get_or_build(&cell, &link, || Err(DiError::Factory {
                name: "A",
                message: "boom".into(),
            }))
            .unwrap_err();
        assert!(matches!(err, DiError::Factory { .. }));
        assert!(cell.get().is_none());
        assert!(builds.state.lock().owners.is_empty());

        let value = builds
            .get_or_build(&cell, &link, || Ok(Arc::new(7u8) as AnyArc))
            .unwrap();
        assert_eq!(value.downcast_ref::<u8>(), Some(&7));
    }

    #[test]
    fn waiters_reuse_the_built_value() {
        let builds = Arc::new(SingletonBuilds::default());
        let cell = Arc::new(OnceCell::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (builds, cell, calls) = (builds.clone(), cell.clone(), calls.clone());
                thread::spawn(move || {
                    let key = key_of_type::<B>();
                    let link = ChainLink::enter(&key, None).unwrap();
                    builds
                        .get_or_build(&cell, &link, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(10));
                            Ok(Arc::new(1u32) as AnyArc)
                        })
                        .unwrap()
                })
            })
            .collect();

        let values: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    }
}
