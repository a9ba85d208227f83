use log::trace;

use crate::{
    config::NameTreeOptions,
    error::ConfigError,
    hash::{compute_hashes, HashSequence},
    name::Name,
};

use super::{
    entry::{Entry, EntryId},
    enumerate::{
        any_entry, any_entry_subtree, EntrySelector, EntrySubTreeSelector, FullEnumeration,
        PartialEnumeration, PrefixMatches,
    },
    hashtable::{Hashtable, HashtableOptions},
};

/// Default depth limit for the names the tables index by.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// The name-indexed structure shared by FIB, PIT, Measurements and
/// StrategyChoice.
///
/// Every prefix of a materialised name is itself materialised, so the
/// entries form a tree rooted at `/`. Lookups go through a hashtable keyed
/// on the prefix, which keeps exact and longest-prefix matches close to
/// constant time per probed length.
///
/// The tree itself materialises names of any length. [`NameTree::max_depth`]
/// is the limit the tables apply before they look a name up.
pub struct NameTree {
    ht: Hashtable,
    max_depth: usize,
}

impl NameTree {
    pub fn new(options: NameTreeOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self {
            ht: Hashtable::new(options.hashtable)?,
            max_depth: options.max_depth,
        })
    }

    /// A tree with `n_buckets` initial (and minimum) buckets.
    ///
    /// # Panics
    ///
    /// If `n_buckets` is zero.
    pub fn with_buckets(n_buckets: usize) -> Self {
        assert!(n_buckets > 0, "a name tree needs at least one bucket");
        Self::with_valid_options(NameTreeOptions {
            hashtable: HashtableOptions::new(n_buckets),
            max_depth: DEFAULT_MAX_DEPTH,
        })
    }

    fn with_valid_options(options: NameTreeOptions) -> Self {
        match Self::new(options) {
            Ok(tree) => tree,
            Err(err) => unreachable!("built-in name tree options rejected: {err}"),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.ht.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.ht.n_buckets()
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.ht.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.ht.get_mut(id)
    }

    /// Finds or creates the entry for `name` along with all its ancestors.
    pub fn lookup(&mut self, name: &Name) -> EntryId {
        self.lookup_prefix(name, name.len())
    }

    /// Finds or creates the entry for the first `prefix_len` components of `name`.
    pub fn lookup_prefix(&mut self, name: &Name, prefix_len: usize) -> EntryId {
        let depth = prefix_len.min(name.len());
        let hashes = compute_hashes(name, depth);

        // The deepest materialised ancestor
        let mut parent = None;
        let mut first_missing = 0;
        for len in (0..=depth).rev() {
            if let Some(id) = self.ht.find_with(name, len, &hashes) {
                parent = Some(id);
                first_missing = len + 1;
                break;
            }
        }

        for len in first_missing..=depth {
            let (id, is_new) = self.ht.insert(name, len, &hashes);
            debug_assert!(is_new);
            if let Some(parent) = parent {
                self.link(parent, id);
            }
            parent = Some(id);
        }

        match parent {
            Some(id) => id,
            None => unreachable!("lookup of {} produced no entry", name),
        }
    }

    /// The entry for exactly `name`, if materialised.
    pub fn find_exact_match(&self, name: &Name) -> Option<EntryId> {
        self.find_exact_match_prefix(name, name.len())
    }

    /// The entry for exactly the first `prefix_len` components of `name`.
    pub fn find_exact_match_prefix(&self, name: &Name, prefix_len: usize) -> Option<EntryId> {
        self.ht.find(name, prefix_len.min(name.len()))
    }

    /// The deepest materialised prefix of `name`. Always succeeds once the
    /// root exists.
    pub fn find_longest_prefix_match(&self, name: &Name) -> Option<EntryId> {
        self.find_longest_prefix_match_with(name, any_entry)
    }

    /// The deepest materialised prefix of `name` accepted by `selector`.
    pub fn find_longest_prefix_match_with<F>(&self, name: &Name, mut selector: F) -> Option<EntryId>
    where
        F: FnMut(&Entry) -> bool,
    {
        let hashes = compute_hashes(name, name.len());
        for len in (0..=name.len()).rev() {
            if let Some(entry) = self.find_prefix(name, len, &hashes).and_then(|id| self.get(id)) {
                if selector(entry) {
                    return Some(entry.id());
                }
            }
        }
        None
    }

    /// Walks from `id` towards the root and returns the first entry accepted
    /// by `selector`, starting with `id` itself.
    pub fn find_longest_prefix_match_from<F>(&self, id: EntryId, mut selector: F) -> Option<EntryId>
    where
        F: FnMut(&Entry) -> bool,
    {
        let mut cursor = Some(id);
        while let Some(entry) = cursor.and_then(|id| self.get(id)) {
            if selector(entry) {
                return Some(entry.id());
            }
            cursor = entry.parent();
        }
        None
    }

    /// Erases `id` if it is empty, then each ancestor that becomes empty.
    /// Returns whether `id` was erased.
    pub fn erase_if_empty(&mut self, id: EntryId) -> bool {
        self.erase_if_empty_with(id, true) > 0
    }

    /// Like [`NameTree::erase_if_empty`], but only climbs to the ancestors when
    /// `can_erase_ancestors` is set. Returns the number of entries erased.
    pub fn erase_if_empty_with(&mut self, id: EntryId, can_erase_ancestors: bool) -> usize {
        let mut n_erased = 0;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let parent = match self.get(current) {
                Some(entry) if entry.is_empty() => entry.parent(),
                _ => break,
            };
            if let Some(parent) = parent {
                self.unlink(parent, current);
            }
            self.ht.erase(current);
            n_erased += 1;

            if !can_erase_ancestors {
                break;
            }
            cursor = parent;
        }

        if n_erased == 0 {
            trace!("not erasing {:?}, in use or already gone", id);
        }
        n_erased
    }

    /// Visits every entry.
    pub fn full_enumerate(&self) -> FullEnumeration<EntrySelector> {
        FullEnumeration::new(any_entry as EntrySelector)
    }

    /// Visits every entry accepted by `selector`.
    pub fn full_enumerate_with<F>(&self, selector: F) -> FullEnumeration<F>
    where
        F: FnMut(&Entry) -> bool,
    {
        FullEnumeration::new(selector)
    }

    /// Visits `prefix` and its whole subtree.
    pub fn partial_enumerate(&self, prefix: &Name) -> PartialEnumeration<EntrySubTreeSelector> {
        self.partial_enumerate_with(prefix, any_entry_subtree as EntrySubTreeSelector)
    }

    /// Visits the subtree of `prefix` in pre-order. For each entry the
    /// predicate returns whether to yield the entry and whether to enter its
    /// children.
    pub fn partial_enumerate_with<F>(&self, prefix: &Name, predicate: F) -> PartialEnumeration<F>
    where
        F: FnMut(&Entry) -> (bool, bool),
    {
        PartialEnumeration::new(self.find_exact_match(prefix), predicate)
    }

    /// Visits every materialised prefix of `name`, from the root outward.
    pub fn find_all_matches(&self, name: &Name) -> PrefixMatches<EntrySelector> {
        self.find_all_matches_with(name, any_entry as EntrySelector)
    }

    /// Visits every materialised prefix of `name` accepted by `selector`,
    /// from the root outward.
    pub fn find_all_matches_with<F>(&self, name: &Name, selector: F) -> PrefixMatches<F>
    where
        F: FnMut(&Entry) -> bool,
    {
        PrefixMatches::new(name.clone(), selector)
    }

    pub(crate) fn find_prefix(&self, name: &Name, prefix_len: usize, hashes: &HashSequence) -> Option<EntryId> {
        self.ht.find_with(name, prefix_len, hashes)
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.ht.slot_count()
    }

    pub(crate) fn handle_at(&self, slot: usize) -> Option<EntryId> {
        self.ht.handle_at(slot)
    }

    fn link(&mut self, parent: EntryId, child: EntryId) {
        self.entry_mut(child).set_parent(Some(parent));
        self.entry_mut(parent).push_child(child);
    }

    fn unlink(&mut self, parent: EntryId, child: EntryId) {
        self.entry_mut(parent).remove_child(child);
        self.entry_mut(child).set_parent(None);
    }

    fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        match self.ht.get_mut(id) {
            Some(entry) => entry,
            None => panic!("tree link refers to missing entry {:?}", id),
        }
    }
}

impl Default for NameTree {
    fn default() -> Self {
        Self::with_valid_options(NameTreeOptions::default())
    }
}
