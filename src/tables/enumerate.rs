//! Enumerations over a [`NameTree`].
//!
//! An enumeration is a cursor. It holds no borrow of the tree between two
//! calls to [`Enumeration::advance`], so the tree may be modified in between.
//! Entries erased meanwhile are skipped, entries inserted meanwhile may or may
//! not be visited, and every other entry is visited exactly once.

use crate::{
    hash::{compute_hashes, HashSequence},
    name::Name,
};

use super::{
    entry::{Entry, EntryId},
    name_tree::NameTree,
};

/// Decides whether an entry is yielded.
pub type EntrySelector = fn(&Entry) -> bool;

/// Decides whether an entry is yielded, and whether its children are entered.
pub type EntrySubTreeSelector = fn(&Entry) -> (bool, bool);

pub fn any_entry(_: &Entry) -> bool {
    true
}

pub fn any_entry_subtree(_: &Entry) -> (bool, bool) {
    (true, true)
}

pub trait Enumeration {
    /// Moves to the next entry and returns its id, or `None` when done.
    fn advance(&mut self, tree: &NameTree) -> Option<EntryId>;

    /// Starts over from the beginning.
    fn restart(&mut self);

    /// Read-only iteration over the remaining entries.
    fn entries(self, tree: &NameTree) -> Entries<'_, Self>
    where
        Self: Sized,
    {
        Entries {
            tree,
            enumeration: self,
        }
    }
}

/// Iterator adapter returned by [`Enumeration::entries`]. The tree stays
/// borrowed for as long as it lives.
pub struct Entries<'a, E> {
    tree: &'a NameTree,
    enumeration: E,
}

impl<'a, E: Enumeration> Iterator for Entries<'a, E> {
    type Item = &'a Entry;

    fn next(&mut self) -> Option<&'a Entry> {
        loop {
            let id = self.enumeration.advance(self.tree)?;
            if let Some(entry) = self.tree.get(id) {
                return Some(entry);
            }
        }
    }
}

/// Every entry of the tree in storage order.
///
/// Storage slots outlive resizes, so walking them never misses or repeats an
/// entry when buckets are rehashed.
pub struct FullEnumeration<F> {
    next_slot: usize,
    selector: F,
}

impl<F> FullEnumeration<F>
where
    F: FnMut(&Entry) -> bool,
{
    pub fn new(selector: F) -> Self {
        Self {
            next_slot: 0,
            selector,
        }
    }
}

impl<F> Enumeration for FullEnumeration<F>
where
    F: FnMut(&Entry) -> bool,
{
    fn advance(&mut self, tree: &NameTree) -> Option<EntryId> {
        while self.next_slot < tree.slot_count() {
            let slot = self.next_slot;
            self.next_slot += 1;
            if let Some(entry) = tree.handle_at(slot).and_then(|id| tree.get(id)) {
                if (self.selector)(entry) {
                    return Some(entry.id());
                }
            }
        }
        None
    }

    fn restart(&mut self) {
        self.next_slot = 0;
    }
}

/// A pre-order walk of the subtree below some entry.
pub struct PartialEnumeration<F> {
    root: Option<EntryId>,
    stack: Vec<EntryId>,
    predicate: F,
}

impl<F> PartialEnumeration<F>
where
    F: FnMut(&Entry) -> (bool, bool),
{
    /// Walks from `root`; an absent root gives an empty enumeration.
    pub fn new(root: Option<EntryId>, predicate: F) -> Self {
        Self {
            root,
            stack: root.into_iter().collect(),
            predicate,
        }
    }
}

impl<F> Enumeration for PartialEnumeration<F>
where
    F: FnMut(&Entry) -> (bool, bool),
{
    fn advance(&mut self, tree: &NameTree) -> Option<EntryId> {
        while let Some(id) = self.stack.pop() {
            // Erased since it was pushed
            let Some(entry) = tree.get(id) else {
                continue;
            };
            let (visit, descend) = (self.predicate)(entry);
            if descend {
                // Reversed so the first child is popped first
                self.stack.extend(entry.children().iter().rev());
            }
            if visit {
                return Some(id);
            }
        }
        None
    }

    fn restart(&mut self) {
        self.stack.clear();
        self.stack.extend(self.root);
    }
}

/// The materialised prefixes of a name, shortest first.
pub struct PrefixMatches<F> {
    name: Name,
    hashes: HashSequence,
    next_len: usize,
    selector: F,
}

impl<F> PrefixMatches<F>
where
    F: FnMut(&Entry) -> bool,
{
    pub fn new(name: Name, selector: F) -> Self {
        let hashes = compute_hashes(&name, name.len());
        Self {
            name,
            hashes,
            next_len: 0,
            selector,
        }
    }
}

impl<F> Enumeration for PrefixMatches<F>
where
    F: FnMut(&Entry) -> bool,
{
    fn advance(&mut self, tree: &NameTree) -> Option<EntryId> {
        while self.next_len < self.hashes.len() {
            let len = self.next_len;
            self.next_len += 1;
            match tree
                .find_prefix(&self.name, len, &self.hashes)
                .and_then(|id| tree.get(id))
            {
                Some(entry) => {
                    if (self.selector)(entry) {
                        return Some(entry.id());
                    }
                }
                None => {
                    // No deeper prefix can exist without this one
                    self.next_len = self.hashes.len();
                }
            }
        }
        None
    }

    fn restart(&mut self) {
        self.next_len = 0;
    }
}
