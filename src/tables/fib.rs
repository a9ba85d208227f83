use log::trace;

use crate::{error::TableError, name::Name};

use super::{
    arena::{Arena, Handle},
    entry::{Entry, EntryId},
    enumerate::Enumeration,
    name_tree::NameTree,
    FaceToken,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NextHop {
    pub cost: u32,
    pub face: FaceToken,
}

/// Next hops registered for one name prefix.
pub struct FibEntry {
    prefix: Name,
    // Ordered by cost
    next_hops: Vec<NextHop>,
    name_tree_entry: EntryId,
}

impl FibEntry {
    pub(crate) fn new(prefix: Name, name_tree_entry: EntryId) -> Self {
        Self {
            prefix,
            next_hops: Vec::new(),
            name_tree_entry,
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn next_hops(&self) -> &[NextHop] {
        &self.next_hops
    }

    pub fn has_next_hops(&self) -> bool {
        !self.next_hops.is_empty()
    }

    pub fn has_next_hop(&self, face: FaceToken) -> bool {
        self.next_hops.iter().any(|x| x.face == face)
    }

    pub fn name_tree_entry(&self) -> EntryId {
        self.name_tree_entry
    }

    fn add_or_update_next_hop(&mut self, face: FaceToken, cost: u32) -> bool {
        let is_new = match self.next_hops.iter().position(|x| x.face == face) {
            Some(index) => {
                self.next_hops[index].cost = cost;
                false
            }
            None => {
                self.next_hops.push(NextHop { cost, face });
                true
            }
        };
        self.next_hops.sort();
        is_new
    }

    fn remove_next_hop(&mut self, face: FaceToken) -> bool {
        match self.next_hops.iter().position(|x| x.face == face) {
            Some(index) => {
                self.next_hops.remove(index);
                true
            }
            None => false,
        }
    }
}

fn has_fib_entry(entry: &Entry) -> bool {
    entry.fib_entry().is_some()
}

/// The forwarding table: which faces serve which name prefixes.
#[derive(Default)]
pub struct Fib {
    entries: Arena<FibEntry>,
}

impl Fib {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, handle: Handle<FibEntry>) -> Option<&FibEntry> {
        self.entries.get(handle)
    }

    /// Finds or creates the entry for `prefix`. The flag tells whether it was
    /// created.
    pub fn insert(
        &mut self,
        tree: &mut NameTree,
        prefix: &Name,
    ) -> Result<(Handle<FibEntry>, bool), TableError> {
        if prefix.len() > tree.max_depth() {
            return Err(TableError::DepthExceeded {
                len: prefix.len(),
                max_depth: tree.max_depth(),
            });
        }

        let nte = tree.lookup(prefix);
        let Some(entry) = tree.get_mut(nte) else {
            unreachable!("fresh lookup of {} is gone", prefix)
        };
        if let Some(existing) = entry.fib_entry() {
            return Ok((existing, false));
        }

        let handle = self.entries.insert(FibEntry::new(prefix.clone(), nte));
        entry.set_fib_entry(Some(handle));
        trace!("fib insert {}", prefix);
        Ok((handle, true))
    }

    pub fn find_exact_match(&self, tree: &NameTree, prefix: &Name) -> Option<&FibEntry> {
        let handle = tree
            .find_exact_match(prefix)
            .and_then(|id| tree.get(id))
            .and_then(|entry| entry.fib_entry())?;
        self.entries.get(handle)
    }

    /// The entry with the longest prefix of `name`, if any prefix is registered.
    pub fn find_longest_prefix_match(&self, tree: &NameTree, name: &Name) -> Option<&FibEntry> {
        let handle = tree
            .find_longest_prefix_match_with(name, has_fib_entry)
            .and_then(|id| tree.get(id))
            .and_then(|entry| entry.fib_entry())?;
        self.entries.get(handle)
    }

    /// Registers `face` for `prefix`, or updates its cost if already there.
    pub fn add_or_update_next_hop(
        &mut self,
        tree: &mut NameTree,
        prefix: &Name,
        face: FaceToken,
        cost: u32,
    ) -> Result<Handle<FibEntry>, TableError> {
        let (handle, _) = self.insert(tree, prefix)?;
        if let Some(entry) = self.entries.get_mut(handle) {
            entry.add_or_update_next_hop(face, cost);
        }
        Ok(handle)
    }

    /// Removes `face` from `prefix`. The entry goes away with its last next hop.
    pub fn remove_next_hop(&mut self, tree: &mut NameTree, prefix: &Name, face: FaceToken) -> bool {
        let Some(handle) = tree
            .find_exact_match(prefix)
            .and_then(|id| tree.get(id))
            .and_then(|entry| entry.fib_entry())
        else {
            return false;
        };
        self.remove_next_hop_from(tree, handle, face)
    }

    pub fn erase(&mut self, tree: &mut NameTree, prefix: &Name) -> bool {
        let handle = tree
            .find_exact_match(prefix)
            .and_then(|id| tree.get(id))
            .and_then(|entry| entry.fib_entry());
        match handle {
            Some(handle) => self.erase_entry(tree, handle),
            None => false,
        }
    }

    /// Removes `face` from every entry. Returns the number of entries that
    /// were erased because no next hop remained.
    pub fn remove_face(&mut self, tree: &mut NameTree, face: FaceToken) -> usize {
        let handles: Vec<Handle<FibEntry>> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.has_next_hop(face))
            .map(|(handle, _)| handle)
            .collect();
        let before = self.len();
        for handle in handles {
            self.remove_next_hop_from(tree, handle, face);
        }
        before - self.len()
    }

    /// All entries, in name tree storage order.
    pub fn iter<'a>(&'a self, tree: &'a NameTree) -> impl Iterator<Item = &'a FibEntry> + 'a {
        tree.full_enumerate_with(has_fib_entry)
            .entries(tree)
            .filter_map(|entry| entry.fib_entry())
            .filter_map(|handle| self.entries.get(handle))
    }

    fn remove_next_hop_from(
        &mut self,
        tree: &mut NameTree,
        handle: Handle<FibEntry>,
        face: FaceToken,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(handle) else {
            return false;
        };
        if !entry.remove_next_hop(face) {
            return false;
        }
        trace!("fib remove next hop {:?} from {}", face, entry.prefix());
        if !entry.has_next_hops() {
            self.erase_entry(tree, handle);
        }
        true
    }

    fn erase_entry(&mut self, tree: &mut NameTree, handle: Handle<FibEntry>) -> bool {
        let Some(removed) = self.entries.remove(handle) else {
            return false;
        };
        trace!("fib erase {}", removed.prefix);
        if let Some(entry) = tree.get_mut(removed.name_tree_entry) {
            entry.set_fib_entry(None);
        }
        tree.erase_if_empty(removed.name_tree_entry);
        true
    }
}
