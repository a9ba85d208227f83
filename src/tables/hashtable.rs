use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    hash::{compute_hash, HashSequence, HashValue},
    name::Name,
};

use super::{
    arena::Arena,
    entry::{Entry, EntryId},
};

/// Sizing policy of the bucket array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashtableOptions {
    /// Bucket count at construction.
    pub initial_size: usize,
    /// The bucket count never shrinks below this.
    pub min_size: usize,
    /// Expand when the entry count exceeds `expand_load_factor * buckets`.
    pub expand_load_factor: f32,
    /// Multiplier applied to the bucket count on expansion.
    pub expand_factor: f32,
    /// Shrink when the entry count drops below `shrink_load_factor * buckets`.
    pub shrink_load_factor: f32,
    /// Multiplier applied to the bucket count on shrinking.
    pub shrink_factor: f32,
}

impl HashtableOptions {
    pub fn new(size: usize) -> Self {
        Self {
            initial_size: size,
            min_size: size,
            expand_load_factor: 0.5,
            expand_factor: 2.0,
            shrink_load_factor: 0.1,
            shrink_factor: 0.5,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |option, reason: &str| {
            Err(ConfigError::InvalidOption {
                option,
                reason: reason.to_string(),
            })
        };
        if self.min_size == 0 {
            return invalid("min_size", "must be positive");
        }
        if self.initial_size < self.min_size {
            return invalid("initial_size", "must not be below min_size");
        }
        if !(self.expand_load_factor > 0.0 && self.expand_load_factor <= 1.0) {
            return invalid("expand_load_factor", "must be in (0, 1]");
        }
        if !(self.expand_factor > 1.0) {
            return invalid("expand_factor", "must be greater than 1");
        }
        if !(self.shrink_load_factor >= 0.0 && self.shrink_load_factor < self.expand_load_factor)
        {
            return invalid("shrink_load_factor", "must be in [0, expand_load_factor)");
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return invalid("shrink_factor", "must be in (0, 1)");
        }
        Ok(())
    }
}

impl Default for HashtableOptions {
    fn default() -> Self {
        Self::new(16)
    }
}

/// Entries keyed by name prefix, chained per bucket.
///
/// The arena owns the entries and the chains run through their `prev`/`next`
/// ids, so resizing rewires ids and never moves an entry.
pub(crate) struct Hashtable {
    entries: Arena<Entry>,
    buckets: Vec<Option<EntryId>>,
    options: HashtableOptions,
    expand_threshold: usize,
    shrink_threshold: usize,
}

impl Hashtable {
    pub fn new(options: HashtableOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let mut ht = Self {
            entries: Arena::new(),
            buckets: vec![None; options.initial_size],
            options,
            expand_threshold: 0,
            shrink_threshold: 0,
        };
        ht.compute_thresholds();
        Ok(ht)
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn n_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn compute_bucket_index(&self, hash: HashValue) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    #[cfg(test)]
    pub fn bucket(&self, index: usize) -> Option<EntryId> {
        self.buckets[index]
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.entries.get_mut(id)
    }

    pub fn slot_count(&self) -> usize {
        self.entries.slot_count()
    }

    pub fn handle_at(&self, slot: usize) -> Option<EntryId> {
        self.entries.handle_at(slot)
    }

    /// Finds the entry for the first `prefix_len` components of `name`.
    pub fn find(&self, name: &Name, prefix_len: usize) -> Option<EntryId> {
        self.find_in_bucket(name, prefix_len, compute_hash(name, prefix_len))
    }

    /// Like [`Hashtable::find`], with `hashes` from [`crate::hash::compute_hashes`].
    pub fn find_with(&self, name: &Name, prefix_len: usize, hashes: &HashSequence) -> Option<EntryId> {
        self.find_in_bucket(name, prefix_len, hashes[prefix_len])
    }

    /// Finds or creates the entry for the first `prefix_len` components of
    /// `name`. The flag tells whether it was created.
    pub fn insert(&mut self, name: &Name, prefix_len: usize, hashes: &HashSequence) -> (EntryId, bool) {
        let hash = hashes[prefix_len];
        if let Some(id) = self.find_in_bucket(name, prefix_len, hash) {
            return (id, false);
        }

        let bucket = self.compute_bucket_index(hash);
        let id = self
            .entries
            .insert_with(|id| Entry::new(id, name.prefix(prefix_len), hash));
        self.attach(bucket, id);
        trace!("insert {:?} {} in bucket {}", id, name.prefix(prefix_len), bucket);

        if self.size() > self.expand_threshold {
            // Small tables with a small factor would otherwise round back to the same count
            let n_buckets = self.n_buckets();
            let new_n_buckets = ((self.options.expand_factor * n_buckets as f32) as usize).max(n_buckets + 1);
            self.resize(new_n_buckets);
        }
        (id, true)
    }

    /// Removes an entry that has already been unlinked from its parent.
    pub fn erase(&mut self, id: EntryId) -> Entry {
        let (bucket, name) = {
            let entry = self.entry(id);
            assert!(
                entry.parent().is_none(),
                "erasing {} while it is still linked to its parent",
                entry.name()
            );
            (self.compute_bucket_index(entry.hash()), entry.name().clone())
        };
        trace!("erase {:?} {} in bucket {}", id, name, bucket);
        self.detach(bucket, id);
        let removed = match self.entries.remove(id) {
            Some(entry) => entry,
            None => unreachable!("{:?} vanished during erase", id),
        };

        if self.size() < self.shrink_threshold {
            let new_n_buckets = self
                .options
                .min_size
                .max((self.options.shrink_factor * self.n_buckets() as f32) as usize);
            self.resize(new_n_buckets);
        }
        removed
    }

    /// Rehashes every entry into `new_n_buckets` buckets.
    pub fn resize(&mut self, new_n_buckets: usize) {
        if new_n_buckets == self.n_buckets() {
            return;
        }
        debug!(
            "resize from {} to {} buckets with {} entries",
            self.n_buckets(),
            new_n_buckets,
            self.size()
        );

        let old_buckets = core::mem::replace(&mut self.buckets, vec![None; new_n_buckets]);
        for head in old_buckets {
            let mut cursor = head;
            while let Some(id) = cursor {
                let (next, hash) = {
                    let entry = self.entry(id);
                    (entry.next, entry.hash())
                };
                let bucket = self.compute_bucket_index(hash);
                self.attach(bucket, id);
                cursor = next;
            }
        }

        self.compute_thresholds();
    }

    fn find_in_bucket(&self, name: &Name, prefix_len: usize, hash: HashValue) -> Option<EntryId> {
        let bucket = self.compute_bucket_index(hash);
        let mut cursor = self.buckets[bucket];
        while let Some(id) = cursor {
            let entry = self.entry(id);
            if entry.hash() == hash && name.prefix_eq(prefix_len, entry.name()) {
                trace!("found {} in bucket {}", entry.name(), bucket);
                return Some(id);
            }
            cursor = entry.next;
        }
        trace!("{} not found in bucket {}", name.prefix(prefix_len), bucket);
        None
    }

    fn entry(&self, id: EntryId) -> &Entry {
        match self.entries.get(id) {
            Some(entry) => entry,
            None => panic!("bucket chain refers to missing entry {:?}", id),
        }
    }

    fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        match self.entries.get_mut(id) {
            Some(entry) => entry,
            None => panic!("bucket chain refers to missing entry {:?}", id),
        }
    }

    // Pushes `id` at the head of `bucket`.
    fn attach(&mut self, bucket: usize, id: EntryId) {
        let head = self.buckets[bucket];
        {
            let entry = self.entry_mut(id);
            entry.prev = None;
            entry.next = head;
        }
        if let Some(head) = head {
            self.entry_mut(head).prev = Some(id);
        }
        self.buckets[bucket] = Some(id);
    }

    fn detach(&mut self, bucket: usize, id: EntryId) {
        let (prev, next) = {
            let entry = self.entry_mut(id);
            let links = (entry.prev, entry.next);
            entry.prev = None;
            entry.next = None;
            links
        };
        match prev {
            Some(prev) => self.entry_mut(prev).next = next,
            None => {
                assert_eq!(self.buckets[bucket], Some(id), "chain head mismatch");
                self.buckets[bucket] = next;
            }
        }
        if let Some(next) = next {
            self.entry_mut(next).prev = prev;
        }
    }

    fn compute_thresholds(&mut self) {
        let n = self.n_buckets() as f32;
        self.expand_threshold = (self.options.expand_load_factor * n) as usize;
        self.shrink_threshold = (self.options.shrink_load_factor * n) as usize;
    }
}
