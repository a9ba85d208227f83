use core::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
};

use slab::Slab;

/// A typed reference to a value owned by an arena.
///
/// Handles carry the generation of the slot they were issued for, so a handle
/// to a removed value never resolves to whatever reuses the slot later.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.index, self.generation).cmp(&(other.index, other.generation))
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Owns values in stable slots. A value never moves once inserted,
/// and freed slots are recycled for later insertions.
pub(crate) struct Arena<T> {
    slots: Slab<T>,
    // Generation of every slot the slab has handed out, vacant or not
    generations: Vec<u32>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Slab::new(),
            generations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots ever allocated, occupied or not.
    pub fn slot_count(&self) -> usize {
        self.generations.len()
    }

    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.insert_with(|_| value)
    }

    /// Inserts a value that needs to know its own handle.
    pub fn insert_with<F>(&mut self, f: F) -> Handle<T>
    where
        F: FnOnce(Handle<T>) -> T,
    {
        let vacant = self.slots.vacant_entry();
        let key = vacant.key();
        let Ok(index) = u32::try_from(key) else {
            panic!("arena slot index {key} overflows");
        };
        if key == self.generations.len() {
            self.generations.push(0);
        }
        let handle = Handle::new(index, self.generations[key]);
        vacant.insert(f(handle));
        handle
    }

    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }
        let value = self.slots.try_remove(handle.index())?;
        let generation = &mut self.generations[handle.index()];
        *generation = generation.wrapping_add(1);
        Some(value)
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        if self.generations.get(handle.index()) != Some(&handle.generation) {
            return None;
        }
        self.slots.get(handle.index())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        if self.generations.get(handle.index()) != Some(&handle.generation) {
            return None;
        }
        self.slots.get_mut(handle.index())
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// The handle of whatever currently occupies slot `index`, if anything.
    pub fn handle_at(&self, index: usize) -> Option<Handle<T>> {
        self.slots
            .get(index)
            .map(|_| Handle::new(index as u32, self.generations[index]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.slots
            .iter()
            .map(|(key, value)| (Handle::new(key as u32, self.generations[key]), value))
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}
