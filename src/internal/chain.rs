//! In-progress resolution chain used for cycle detection.
//!
//! Every resolution pushes a link that lives on the resolving stack frame
//! and points at its parent. Cycle detection walks parents only, so it is
//! O(depth) and needs no shared or thread-local state.

use crate::error::DiError;
use crate::key::Key;

/// One frame of an in-progress resolution.
#[derive(Debug, Clone, Copy)]
pub struct ChainLink<'a> {
    key: Key,
    parent: Option<&'a ChainLink<'a>>,
}

impl<'a> ChainLink<'a> {
    /// Pushes `key` onto the chain, failing if it is already being resolved.
    pub(crate) fn enter(key: &Key, parent: Option<&'a ChainLink<'a>>) -> Result<Self, DiError> {
        let mut cursor = parent;
        while let Some(link) = cursor {
            if link.key == *key {
                let mut path = path_of(parent);
                path.push(key.display_name());
                return Err(DiError::Circular(path));
            }
            cursor = link.parent;
        }
        Ok(Self { key: *key, parent })
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn depth(&self) -> usize {
        1 + self.parent.map_or(0, |p| p.depth())
    }

    /// Keys enclosing this link, innermost first.
    pub(crate) fn ancestors(&self) -> impl Iterator<Item = &'a Key> + 'a {
        std::iter::successors(self.parent, |link| link.parent).map(|link| &link.key)
    }

    /// Names on the chain, outermost first, ending with this link.
    pub fn path(&self) -> Vec<&'static str> {
        path_of(Some(self))
    }

    pub(crate) fn not_found(&self) -> DiError {
        DiError::NotFound {
            name: self.key.display_name(),
            chain: self.path(),
        }
    }
}

fn path_of(link: Option<&ChainLink<'_>>) -> Vec<&'static str> {
    let mut names = Vec::new();
    let mut cursor = link;
    while let Some(l) = cursor {
        names.push(l.key.display_name());
        cursor = l.parent;
    }
    names.reverse();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::key_of_type;

    struct A;
    struct B;

    #[test]
    fn ancestors_walk_outwards() {
        let a = key_of_type::<A>();
        let b = key_of_type::<B>();
        let root = ChainLink::enter(&a, None).unwrap();
        let mid = ChainLink::enter(&b, Some(&root)).unwrap();
        assert_eq!(root.ancestors().count(), 0);
        assert_eq!(mid.ancestors().collect::<Vec<_>>(), vec![&a]);
    }

    #[test]
    fn detects_revisit_with_full_path() {
        let a = key_of_type::<A>();
        let b = key_of_type::<B>();
        let root = ChainLink::enter(&a, None).unwrap();
        let mid = ChainLink::enter(&b, Some(&root)).unwrap();
        assert_eq!(mid.depth(), 2);

        match ChainLink::enter(&a, Some(&mid)) {
            Err(DiError::Circular(path)) => {
                assert_eq!(path.len(), 3);
                assert!(path[0].ends_with("::A"));
                assert!(path[1].ends_with("::B"));
                assert!(path[2].ends_with("::A"));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn siblings_are_not_cycles() {
        let a = key_of_type::<A>();
        let b = key_of_type::<B>();
        let root = ChainLink::enter(&a, None).unwrap();
        let first = ChainLink::enter(&b, Some(&root)).unwrap();
        drop(first);
        assert!(ChainLink::enter(&b, Some(&root)).is_ok());
    }
}
