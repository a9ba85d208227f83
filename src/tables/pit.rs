use log::trace;

#[cfg(feature = "sha2")]
use crate::name::implicit_digest;
use crate::{name::Name, timestamp::Timestamp};

use super::{
    arena::{Arena, Handle},
    entry::{Entry, EntryId},
    enumerate::Enumeration,
    name_tree::NameTree,
    FaceToken,
};

pub const DEFAULT_INTEREST_LIFETIME_MS: u64 = 4000;

/// An Interest received from one face.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InRecord {
    pub reply_to: FaceToken,
    pub last_nonce: [u8; 4],
    pub expiry: Timestamp,
}

/// Interests pending for one name and CanBePrefix setting.
pub struct PitEntry {
    name: Name,
    can_be_prefix: bool,
    in_records: Vec<InRecord>,
    expiry: Timestamp,
    name_tree_entry: EntryId,
}

impl PitEntry {
    pub(crate) fn new(name: Name, can_be_prefix: bool, name_tree_entry: EntryId, now: Timestamp) -> Self {
        Self {
            name,
            can_be_prefix,
            in_records: Vec::new(),
            expiry: now,
            name_tree_entry,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn can_be_prefix(&self) -> bool {
        self.can_be_prefix
    }

    pub fn in_records(&self) -> &[InRecord] {
        &self.in_records
    }

    /// The latest expiry among the in-records.
    pub fn expiry(&self) -> Timestamp {
        self.expiry
    }

    pub fn name_tree_entry(&self) -> EntryId {
        self.name_tree_entry
    }

    /// Whether any face already sent this nonce, which hints at a loop.
    pub fn has_nonce(&self, nonce: [u8; 4]) -> bool {
        self.in_records.iter().any(|x| x.last_nonce == nonce)
    }

    /// Whether an Interest with these parameters belongs to this entry.
    pub fn can_match(&self, name: &Name, can_be_prefix: bool) -> bool {
        self.can_be_prefix == can_be_prefix && self.name == *name
    }

    /// Whether Data named `data_name` satisfies this entry. `digest` is the
    /// implicit digest of the Data, needed for Interests carrying a full name.
    pub fn can_be_satisfied_by(&self, data_name: &Name, digest: Option<&[u8; 32]>) -> bool {
        if self.can_be_prefix {
            if self.name.is_prefix_of(data_name) {
                return true;
            }
        } else if self.name == *data_name {
            return true;
        }

        // An Interest for the full name carries the digest as last component
        match (digest, self.name.last()) {
            (Some(digest), Some(last)) => {
                self.name.ends_with_implicit_digest()
                    && self.name.len() == data_name.len() + 1
                    && data_name.is_prefix_of(&self.name)
                    && last.bytes.as_ref() == digest.as_slice()
            }
            _ => false,
        }
    }

    fn insert_or_update_in_record(&mut self, reply_to: FaceToken, nonce: [u8; 4], expiry: Timestamp) {
        match self.in_records.iter_mut().find(|x| x.reply_to == reply_to) {
            Some(record) => {
                record.last_nonce = nonce;
                record.expiry = expiry;
            }
            None => self.in_records.push(InRecord {
                reply_to,
                last_nonce: nonce,
                expiry,
            }),
        }
        self.update_expiry();
    }

    fn update_expiry(&mut self) {
        self.expiry = self
            .in_records
            .iter()
            .fold(self.expiry, |expiry, record| expiry.max(record.expiry));
    }
}

fn has_pit_entries(entry: &Entry) -> bool {
    entry.has_pit_entries()
}

/// The pending Interest table.
pub struct Pit {
    entries: Arena<PitEntry>,
    default_lifetime_ms: u64,
}

impl Pit {
    pub fn new(default_lifetime_ms: u64) -> Self {
        Self {
            entries: Arena::new(),
            default_lifetime_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, handle: Handle<PitEntry>) -> Option<&PitEntry> {
        self.entries.get(handle)
    }

    /// Records an Interest. The flag tells whether the entry is new.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &mut self,
        tree: &mut NameTree,
        name: &Name,
        can_be_prefix: bool,
        reply_to: FaceToken,
        nonce: [u8; 4],
        interest_lifetime: Option<u64>,
        now: Timestamp,
    ) -> (Handle<PitEntry>, bool) {
        let expiry = now.adding(interest_lifetime.unwrap_or(self.default_lifetime_ms));
        let depth = Self::name_tree_depth(tree, name);
        let nte = tree.lookup_prefix(name, depth);

        let existing = tree.get(nte).and_then(|entry| {
            entry.pit_entries().iter().copied().find(|handle| {
                self.entries
                    .get(*handle)
                    .is_some_and(|pit| pit.can_match(name, can_be_prefix))
            })
        });
        if let Some(handle) = existing {
            if let Some(pit) = self.entries.get_mut(handle) {
                pit.insert_or_update_in_record(reply_to, nonce, expiry);
            }
            return (handle, false);
        }

        let mut pit = PitEntry::new(name.clone(), can_be_prefix, nte, now);
        pit.insert_or_update_in_record(reply_to, nonce, expiry);
        let handle = self.entries.insert(pit);
        match tree.get_mut(nte) {
            Some(entry) => entry.insert_pit_entry(handle),
            None => unreachable!("fresh lookup of {} is gone", name),
        }
        trace!("pit insert {} can_be_prefix={}", name, can_be_prefix);
        (handle, true)
    }

    /// The entry for exactly this Interest, without creating it.
    pub fn find(&self, tree: &NameTree, name: &Name, can_be_prefix: bool) -> Option<Handle<PitEntry>> {
        let nte = tree.find_exact_match_prefix(name, Self::name_tree_depth(tree, name))?;
        tree.get(nte)?.pit_entries().iter().copied().find(|handle| {
            self.entries
                .get(*handle)
                .is_some_and(|pit| pit.can_match(name, can_be_prefix))
        })
    }

    /// Every entry that Data named `data_name` satisfies, shortest prefix first.
    pub fn find_all_data_matches(
        &self,
        tree: &NameTree,
        data_name: &Name,
        digest: Option<&[u8; 32]>,
    ) -> Vec<Handle<PitEntry>> {
        let mut matches = Vec::new();
        for entry in tree.find_all_matches_with(data_name, has_pit_entries).entries(tree) {
            for handle in entry.pit_entries() {
                if self
                    .entries
                    .get(*handle)
                    .is_some_and(|pit| pit.can_be_satisfied_by(data_name, digest))
                {
                    matches.push(*handle);
                }
            }
        }
        matches
    }

    /// Like [`Pit::find_all_data_matches`] for the wire encoding of a Data
    /// packet, so that Interests for its full name match too.
    #[cfg(feature = "sha2")]
    pub fn find_all_packet_matches(&self, tree: &NameTree, data_name: &Name, packet: &[u8]) -> Vec<Handle<PitEntry>> {
        let digest = implicit_digest(packet);
        self.find_all_data_matches(tree, data_name, Some(&digest))
    }

    pub fn erase(&mut self, tree: &mut NameTree, handle: Handle<PitEntry>) -> bool {
        let Some(removed) = self.entries.remove(handle) else {
            return false;
        };
        trace!("pit erase {}", removed.name);
        if let Some(entry) = tree.get_mut(removed.name_tree_entry) {
            entry.erase_pit_entry(handle);
        }
        tree.erase_if_empty(removed.name_tree_entry);
        true
    }

    /// Erases entries that expired at or before `now`. Returns how many.
    pub fn prune_expired(&mut self, tree: &mut NameTree, now: Timestamp) -> usize {
        let expired: Vec<Handle<PitEntry>> = self
            .entries
            .iter()
            .filter(|(_, pit)| pit.expiry <= now)
            .map(|(handle, _)| handle)
            .collect();
        for handle in &expired {
            self.erase(tree, *handle);
        }
        expired.len()
    }

    /// Drops the in-records of `face`. Entries left without in-records are
    /// erased; returns how many.
    pub fn remove_face(&mut self, tree: &mut NameTree, face: FaceToken) -> usize {
        let mut emptied: Vec<Handle<PitEntry>> =
            self.entries.iter().map(|(handle, _)| handle).collect();
        emptied.retain(|handle| match self.entries.get_mut(*handle) {
            Some(pit) => {
                pit.in_records.retain(|x| x.reply_to != face);
                pit.in_records.is_empty()
            }
            None => false,
        });
        for handle in &emptied {
            self.erase(tree, *handle);
        }
        emptied.len()
    }

    // Interests for a full name share the entry of the Data name
    fn name_tree_depth(tree: &NameTree, name: &Name) -> usize {
        let depth = if name.ends_with_implicit_digest() {
            name.len() - 1
        } else {
            name.len()
        };
        depth.min(tree.max_depth())
    }
}

impl Default for Pit {
    fn default() -> Self {
        Self::new(DEFAULT_INTEREST_LIFETIME_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::NameComponent;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    const T0: Timestamp = Timestamp::from_ms(1_000);

    #[test]
    fn test_insert_find() {
        let mut nt = NameTree::default();
        let mut pit = Pit::default();
        let n = name("/a/b");

        let (h1, is_new) = pit.insert(&mut nt, &n, false, FaceToken(1), [1, 0, 0, 0], None, T0);
        assert!(is_new);
        let (h2, is_new) = pit.insert(&mut nt, &n, false, FaceToken(2), [2, 0, 0, 0], Some(100), T0);
        assert!(!is_new);
        assert_eq!(h1, h2);
        let (h3, is_new) = pit.insert(&mut nt, &n, true, FaceToken(1), [3, 0, 0, 0], None, T0);
        assert!(is_new);
        assert_ne!(h1, h3);
        assert_eq!(pit.len(), 2);

        let entry = pit.get(h1).unwrap();
        assert_eq!(entry.in_records().len(), 2);
        assert!(entry.has_nonce([2, 0, 0, 0]));
        assert!(!entry.has_nonce([3, 0, 0, 0]));
        assert_eq!(entry.expiry(), T0.adding(DEFAULT_INTEREST_LIFETIME_MS));

        assert_eq!(pit.find(&nt, &n, false), Some(h1));
        assert_eq!(pit.find(&nt, &n, true), Some(h3));
        assert_eq!(pit.find(&nt, &name("/a"), false), None);
        let nte = nt.find_exact_match(&n).unwrap();
        assert_eq!(nt.get(nte).unwrap().pit_entries().len(), 2);
    }

    #[test]
    fn test_data_matches() {
        let mut nt = NameTree::default();
        let mut pit = Pit::default();
        let data_name = name("/a/b/c");
        let digest = [7u8; 32];
        let full_name = data_name.adding_component(NameComponent::implicit_digest(digest));

        let (exact, _) = pit.insert(&mut nt, &data_name, false, FaceToken(1), [0; 4], None, T0);
        let (prefix, _) = pit.insert(&mut nt, &name("/a"), true, FaceToken(1), [0; 4], None, T0);
        let (not_prefix, _) = pit.insert(&mut nt, &name("/a"), false, FaceToken(1), [0; 4], None, T0);
        let (full, _) = pit.insert(&mut nt, &full_name, false, FaceToken(1), [0; 4], None, T0);
        let (other, _) = pit.insert(&mut nt, &name("/a/x"), true, FaceToken(1), [0; 4], None, T0);

        // The full-name Interest shares the Data name's tree entry
        assert_eq!(
            pit.get(full).unwrap().name_tree_entry(),
            pit.get(exact).unwrap().name_tree_entry()
        );

        let matches = pit.find_all_data_matches(&nt, &data_name, Some(&digest));
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0], prefix);
        assert!(matches.contains(&exact));
        assert!(matches.contains(&full));
        assert!(!matches.contains(&not_prefix));
        assert!(!matches.contains(&other));

        let wrong_digest = pit.find_all_data_matches(&nt, &data_name, Some(&[8u8; 32]));
        assert!(!wrong_digest.contains(&full));
        assert_eq!(pit.find_all_data_matches(&nt, &data_name, None).len(), 2);
    }

    #[cfg(feature = "sha2")]
    #[test]
    fn test_packet_matches_full_name() {
        let mut nt = NameTree::default();
        let mut pit = Pit::default();
        let data_name = name("/a/b");
        let packet = b"the wire encoding of /a/b";
        let full_name = data_name.adding_component(NameComponent::implicit_digest(implicit_digest(packet)));

        let (full, _) = pit.insert(&mut nt, &full_name, false, FaceToken(1), [0; 4], None, T0);
        let (plain, _) = pit.insert(&mut nt, &data_name, false, FaceToken(1), [1; 4], None, T0);

        let matches = pit.find_all_packet_matches(&nt, &data_name, packet);
        assert_eq!(matches.len(), 2);
        assert!(matches.contains(&full));
        assert!(matches.contains(&plain));
        assert_eq!(pit.find_all_packet_matches(&nt, &data_name, b"other bytes"), vec![plain]);
    }

    #[test]
    fn test_deep_interest_is_found_again() {
        let mut nt = NameTree::default();
        let mut pit = Pit::default();
        let deep = Name::from_components(
            (0..nt.max_depth() + 8).map(|i| NameComponent::generic(format!("c{i}").as_bytes())),
        );

        let (handle, is_new) = pit.insert(&mut nt, &deep, false, FaceToken(1), [1; 4], None, T0);
        assert!(is_new);
        assert_eq!(pit.find(&nt, &deep, false), Some(handle));
        let (again, is_new) = pit.insert(&mut nt, &deep, false, FaceToken(2), [2; 4], None, T0);
        assert!(!is_new);
        assert_eq!(again, handle);

        // Indexed at the depth limit, still matched by the full Data name
        let nte = pit.get(handle).unwrap().name_tree_entry();
        assert_eq!(nt.get(nte).unwrap().name().len(), nt.max_depth());
        assert_eq!(nt.len(), nt.max_depth() + 1);
        assert_eq!(pit.find_all_data_matches(&nt, &deep, None), vec![handle]);
        assert!(pit.find_all_data_matches(&nt, &deep.prefix(nt.max_depth()), None).is_empty());
    }

    #[test]
    fn test_erase_and_prune() {
        let mut nt = NameTree::default();
        let mut pit = Pit::default();

        let (h1, _) = pit.insert(&mut nt, &name("/a/b"), false, FaceToken(1), [0; 4], Some(10), T0);
        pit.insert(&mut nt, &name("/c"), false, FaceToken(1), [0; 4], Some(1000), T0);
        assert_eq!(nt.len(), 4);

        assert_eq!(pit.prune_expired(&mut nt, T0.adding(5)), 0);
        assert_eq!(pit.prune_expired(&mut nt, T0.adding(10)), 1);
        assert!(pit.get(h1).is_none());
        assert!(!pit.erase(&mut nt, h1));
        assert_eq!(nt.len(), 2);
        assert_eq!(pit.len(), 1);
    }

    #[test]
    fn test_remove_face() {
        let mut nt = NameTree::default();
        let mut pit = Pit::default();
        let (shared, _) = pit.insert(&mut nt, &name("/a"), false, FaceToken(1), [0; 4], None, T0);
        pit.insert(&mut nt, &name("/a"), false, FaceToken(2), [0; 4], None, T0);
        pit.insert(&mut nt, &name("/b"), false, FaceToken(1), [0; 4], None, T0);

        assert_eq!(pit.remove_face(&mut nt, FaceToken(1)), 1);
        assert_eq!(pit.len(), 1);
        assert_eq!(pit.get(shared).unwrap().in_records().len(), 1);
        assert_eq!(nt.find_exact_match(&name("/b")), None);
    }
}
