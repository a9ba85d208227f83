use log::trace;

use crate::{name::Name, timestamp::Timestamp};

use super::{
    arena::{Arena, Handle},
    entry::EntryId,
    name_tree::NameTree,
    FaceToken,
};

pub const DEFAULT_MEASUREMENTS_LIFETIME_MS: u64 = 4000;

/// What a forwarding strategy remembers about a prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StrategyInfo {
    pub last_rtt_ms: Option<u64>,
    pub preferred_face: Option<FaceToken>,
}

pub struct MeasurementsEntry {
    name: Name,
    expiry: Timestamp,
    name_tree_entry: EntryId,
    pub strategy_info: Option<StrategyInfo>,
}

impl MeasurementsEntry {
    pub(crate) fn new(name: Name, name_tree_entry: EntryId, expiry: Timestamp) -> Self {
        Self {
            name,
            expiry,
            name_tree_entry,
            strategy_info: None,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn expiry(&self) -> Timestamp {
        self.expiry
    }

    pub fn name_tree_entry(&self) -> EntryId {
        self.name_tree_entry
    }
}

/// Per-prefix state kept by strategies, dropped after a period of disuse.
pub struct Measurements {
    entries: Arena<MeasurementsEntry>,
    initial_lifetime_ms: u64,
}

impl Measurements {
    pub fn new(initial_lifetime_ms: u64) -> Self {
        Self {
            entries: Arena::new(),
            initial_lifetime_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_entry(&self, handle: Handle<MeasurementsEntry>) -> Option<&MeasurementsEntry> {
        self.entries.get(handle)
    }

    pub fn get_entry_mut(&mut self, handle: Handle<MeasurementsEntry>) -> Option<&mut MeasurementsEntry> {
        self.entries.get_mut(handle)
    }

    /// Finds or creates the entry for `name`, cut to the tree's maximum
    /// depth. New entries live for the initial lifetime.
    pub fn get(&mut self, tree: &mut NameTree, name: &Name, now: Timestamp) -> Handle<MeasurementsEntry> {
        let nte = tree.lookup_prefix(name, name.len().min(tree.max_depth()));
        let Some(entry) = tree.get_mut(nte) else {
            unreachable!("fresh lookup of {} is gone", name)
        };
        if let Some(existing) = entry.measurements_entry() {
            return existing;
        }

        let expiry = now.adding(self.initial_lifetime_ms);
        let handle = self
            .entries
            .insert(MeasurementsEntry::new(entry.name().clone(), nte, expiry));
        entry.set_measurements_entry(Some(handle));
        trace!("measurements insert {}", entry.name());
        handle
    }

    /// The entry one component up, or `None` at the root.
    pub fn get_parent(
        &mut self,
        tree: &mut NameTree,
        child: Handle<MeasurementsEntry>,
        now: Timestamp,
    ) -> Option<Handle<MeasurementsEntry>> {
        let parent_name = self.entries.get(child)?.name.dropping_last_component()?;
        Some(self.get(tree, &parent_name, now))
    }

    pub fn find_exact_match(&self, tree: &NameTree, name: &Name) -> Option<Handle<MeasurementsEntry>> {
        tree.find_exact_match(name)
            .and_then(|id| tree.get(id))
            .and_then(|entry| entry.measurements_entry())
    }

    /// The entry with the longest prefix of `name` accepted by `pred`.
    pub fn find_longest_prefix_match<P>(
        &self,
        tree: &NameTree,
        name: &Name,
        mut pred: P,
    ) -> Option<Handle<MeasurementsEntry>>
    where
        P: FnMut(&MeasurementsEntry) -> bool,
    {
        tree.find_longest_prefix_match_with(name, |entry| {
            entry
                .measurements_entry()
                .and_then(|handle| self.entries.get(handle))
                .is_some_and(&mut pred)
        })
        .and_then(|id| tree.get(id))
        .and_then(|entry| entry.measurements_entry())
    }

    /// Keeps the entry at least `lifetime_ms` past `now`. Never shortens it.
    pub fn extend_lifetime(&mut self, handle: Handle<MeasurementsEntry>, lifetime_ms: u64, now: Timestamp) {
        if let Some(entry) = self.entries.get_mut(handle) {
            entry.expiry = entry.expiry.max(now.adding(lifetime_ms));
        }
    }

    /// Erases entries that expired at or before `now`. Returns how many.
    pub fn cleanup_expired(&mut self, tree: &mut NameTree, now: Timestamp) -> usize {
        let expired: Vec<Handle<MeasurementsEntry>> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expiry <= now)
            .map(|(handle, _)| handle)
            .collect();
        for handle in &expired {
            self.erase(tree, *handle);
        }
        expired.len()
    }

    fn erase(&mut self, tree: &mut NameTree, handle: Handle<MeasurementsEntry>) {
        let Some(removed) = self.entries.remove(handle) else {
            return;
        };
        trace!("measurements erase {}", removed.name);
        if let Some(entry) = tree.get_mut(removed.name_tree_entry) {
            entry.set_measurements_entry(None);
        }
        tree.erase_if_empty(removed.name_tree_entry);
    }
}

impl Default for Measurements {
    fn default() -> Self {
        Self::new(DEFAULT_MEASUREMENTS_LIFETIME_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NameTreeOptions;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    const T0: Timestamp = Timestamp::from_ms(50_000);

    #[test]
    fn test_get_and_parent() {
        let mut nt = NameTree::default();
        let mut measurements = Measurements::default();

        let ab = measurements.get(&mut nt, &name("/a/b"), T0);
        assert_eq!(measurements.get(&mut nt, &name("/a/b"), T0), ab);
        assert_eq!(measurements.len(), 1);
        assert_eq!(
            measurements.get_entry(ab).unwrap().expiry(),
            T0.adding(DEFAULT_MEASUREMENTS_LIFETIME_MS)
        );

        let a = measurements.get_parent(&mut nt, ab, T0).unwrap();
        assert_eq!(measurements.get_entry(a).unwrap().name(), &name("/a"));
        let root = measurements.get_parent(&mut nt, a, T0).unwrap();
        assert!(measurements.get_entry(root).unwrap().name().is_empty());
        assert_eq!(measurements.get_parent(&mut nt, root, T0), None);
        assert_eq!(measurements.len(), 3);

        assert_eq!(measurements.find_exact_match(&nt, &name("/a")), Some(a));
        assert_eq!(measurements.find_exact_match(&nt, &name("/a/b/c")), None);
    }

    #[test]
    fn test_get_stops_at_max_depth() {
        let mut nt = NameTree::new(NameTreeOptions {
            max_depth: 2,
            ..NameTreeOptions::default()
        })
        .unwrap();
        let mut measurements = Measurements::default();
        let deep = name("/a/b/c/d");
        let ab = measurements.get(&mut nt, &deep, T0);
        assert_eq!(measurements.get_entry(ab).unwrap().name(), &name("/a/b"));
        assert_eq!(nt.len(), 3);
        assert_eq!(measurements.get(&mut nt, &deep, T0), ab);
        assert_eq!(measurements.find_exact_match(&nt, &name("/a/b")), Some(ab));
    }

    #[test]
    fn test_longest_prefix_match() {
        let mut nt = NameTree::default();
        let mut measurements = Measurements::default();
        let a = measurements.get(&mut nt, &name("/a"), T0);
        let abc = measurements.get(&mut nt, &name("/a/b/c"), T0);
        measurements.get_entry_mut(a).unwrap().strategy_info = Some(StrategyInfo {
            last_rtt_ms: Some(12),
            preferred_face: None,
        });

        let any = |_: &MeasurementsEntry| true;
        assert_eq!(measurements.find_longest_prefix_match(&nt, &name("/a/b/c/d"), any), Some(abc));
        // /a/b is in the tree but has no measurements
        assert_eq!(measurements.find_longest_prefix_match(&nt, &name("/a/b"), any), Some(a));
        assert_eq!(
            measurements.find_longest_prefix_match(&nt, &name("/a/b/c"), |m| m.strategy_info.is_some()),
            Some(a)
        );
        assert_eq!(measurements.find_longest_prefix_match(&nt, &name("/z"), any), None);
    }

    #[test]
    fn test_lifetime_and_cleanup() {
        let mut nt = NameTree::default();
        let mut measurements = Measurements::new(100);
        let a = measurements.get(&mut nt, &name("/a"), T0);
        let b = measurements.get(&mut nt, &name("/b"), T0);

        measurements.extend_lifetime(a, 500, T0);
        assert_eq!(measurements.get_entry(a).unwrap().expiry(), T0.adding(500));
        // Never shortened
        measurements.extend_lifetime(a, 10, T0);
        assert_eq!(measurements.get_entry(a).unwrap().expiry(), T0.adding(500));

        assert_eq!(measurements.cleanup_expired(&mut nt, T0.adding(99)), 0);
        assert_eq!(measurements.cleanup_expired(&mut nt, T0.adding(100)), 1);
        assert!(measurements.get_entry(b).is_none());
        assert_eq!(nt.find_exact_match(&name("/b")), None);
        assert_eq!(measurements.cleanup_expired(&mut nt, T0.adding(500)), 1);
        assert!(nt.is_empty());
    }
}
