use crate::{hash::HashValue, name::Name};

use super::{
    arena::Handle, fib::FibEntry, measurements::MeasurementsEntry, pit::PitEntry,
    strategy_choice::StrategyChoiceEntry,
};

/// Identifies a name tree entry. Stays valid across resizes and resolves
/// to nothing once the entry has been erased.
pub type EntryId = Handle<Entry>;

/// One materialised name prefix.
///
/// The name tree owns every entry. Parent and children are plain ids, and the
/// table slots hold handles into tables that own their records.
pub struct Entry {
    id: EntryId,
    name: Name,
    hash: HashValue,

    // Bucket chain, maintained by the hashtable
    pub(super) prev: Option<EntryId>,
    pub(super) next: Option<EntryId>,

    parent: Option<EntryId>,
    children: Vec<EntryId>,

    fib_entry: Option<Handle<FibEntry>>,
    pit_entries: Vec<Handle<PitEntry>>,
    measurements_entry: Option<Handle<MeasurementsEntry>>,
    strategy_choice_entry: Option<Handle<StrategyChoiceEntry>>,
}

impl Entry {
    pub(super) fn new(id: EntryId, name: Name, hash: HashValue) -> Self {
        Self {
            id,
            name,
            hash,
            prev: None,
            next: None,
            parent: None,
            children: Vec::new(),
            fib_entry: None,
            pit_entries: Vec::new(),
            measurements_entry: None,
            strategy_choice_entry: None,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn hash(&self) -> HashValue {
        self.hash
    }

    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    pub fn children(&self) -> &[EntryId] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// An empty entry has neither children nor table entries and may be erased.
    pub fn is_empty(&self) -> bool {
        !self.has_children() && !self.has_table_entries()
    }

    pub fn has_table_entries(&self) -> bool {
        self.fib_entry.is_some()
            || !self.pit_entries.is_empty()
            || self.measurements_entry.is_some()
            || self.strategy_choice_entry.is_some()
    }

    pub(super) fn set_parent(&mut self, parent: Option<EntryId>) {
        debug_assert!(parent.is_none() || !self.name.is_empty());
        self.parent = parent;
    }

    pub(super) fn push_child(&mut self, child: EntryId) {
        debug_assert!(!self.children.contains(&child));
        self.children.push(child)
    }

    pub(super) fn remove_child(&mut self, child: EntryId) {
        let position = self.children.iter().position(|c| *c == child);
        match position {
            Some(position) => {
                self.children.remove(position);
            }
            None => unreachable!("{:?} is not a child of {}", child, self.name),
        }
    }

    // FIB slot
    pub fn fib_entry(&self) -> Option<Handle<FibEntry>> {
        self.fib_entry
    }

    /// Replaces the FIB slot, returning what was there.
    pub(crate) fn set_fib_entry(
        &mut self,
        fib_entry: Option<Handle<FibEntry>>,
    ) -> Option<Handle<FibEntry>> {
        core::mem::replace(&mut self.fib_entry, fib_entry)
    }

    // PIT slot, several entries can share one name
    pub fn pit_entries(&self) -> &[Handle<PitEntry>] {
        &self.pit_entries
    }

    pub fn has_pit_entries(&self) -> bool {
        !self.pit_entries.is_empty()
    }

    pub(crate) fn insert_pit_entry(&mut self, pit_entry: Handle<PitEntry>) {
        debug_assert!(!self.pit_entries.contains(&pit_entry));
        self.pit_entries.push(pit_entry)
    }

    pub(crate) fn erase_pit_entry(&mut self, pit_entry: Handle<PitEntry>) -> bool {
        match self.pit_entries.iter().position(|p| *p == pit_entry) {
            Some(position) => {
                self.pit_entries.swap_remove(position);
                true
            }
            None => false,
        }
    }

    // Measurements slot
    pub fn measurements_entry(&self) -> Option<Handle<MeasurementsEntry>> {
        self.measurements_entry
    }

    pub(crate) fn set_measurements_entry(
        &mut self,
        measurements_entry: Option<Handle<MeasurementsEntry>>,
    ) -> Option<Handle<MeasurementsEntry>> {
        core::mem::replace(&mut self.measurements_entry, measurements_entry)
    }

    // StrategyChoice slot
    pub fn strategy_choice_entry(&self) -> Option<Handle<StrategyChoiceEntry>> {
        self.strategy_choice_entry
    }

    pub(crate) fn set_strategy_choice_entry(
        &mut self,
        strategy_choice_entry: Option<Handle<StrategyChoiceEntry>>,
    ) -> Option<Handle<StrategyChoiceEntry>> {
        core::mem::replace(&mut self.strategy_choice_entry, strategy_choice_entry)
    }
}
