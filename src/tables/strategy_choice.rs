use log::{info, trace};

use crate::name::Name;

use super::{
    arena::{Arena, Handle},
    entry::{Entry, EntryId},
    enumerate::{Enumeration, PartialEnumeration},
    measurements::Measurements,
    name_tree::NameTree,
};

/// The strategy chosen for one name prefix.
pub struct StrategyChoiceEntry {
    prefix: Name,
    strategy: Name,
    name_tree_entry: EntryId,
}

impl StrategyChoiceEntry {
    pub(crate) fn new(prefix: Name, strategy: Name, name_tree_entry: EntryId) -> Self {
        Self {
            prefix,
            strategy,
            name_tree_entry,
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn strategy(&self) -> &Name {
        &self.strategy
    }

    pub fn name_tree_entry(&self) -> EntryId {
        self.name_tree_entry
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InsertResult {
    Ok,
    /// No registered strategy has this name.
    NotRegistered,
    /// The prefix is longer than the name tree allows.
    DepthExceeded,
}

fn has_strategy_choice(entry: &Entry) -> bool {
    entry.strategy_choice_entry().is_some()
}

/// Which forwarding strategy governs which part of the namespace.
///
/// A prefix uses the strategy of its longest prefix that has a choice. The
/// root always has one once [`StrategyChoice::set_default_strategy`] ran.
#[derive(Default)]
pub struct StrategyChoice {
    entries: Arena<StrategyChoiceEntry>,
    registered: Vec<Name>,
}

impl StrategyChoice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes `strategy`, and every versioned name below it, available for
    /// [`StrategyChoice::insert`].
    pub fn register_strategy(&mut self, strategy: Name) {
        if !self.is_registered(&strategy) {
            self.registered.push(strategy);
        }
    }

    pub fn is_registered(&self, strategy: &Name) -> bool {
        self.registered.iter().any(|r| r.is_prefix_of(strategy))
    }

    /// Installs the strategy of the root prefix.
    pub fn set_default_strategy(&mut self, tree: &mut NameTree, measurements: &mut Measurements, strategy: Name) {
        self.register_strategy(strategy.clone());
        self.set_strategy(tree, measurements, &Name::new(), strategy);
    }

    /// Sets the strategy for `prefix`.
    pub fn insert(
        &mut self,
        tree: &mut NameTree,
        measurements: &mut Measurements,
        prefix: &Name,
        strategy: Name,
    ) -> InsertResult {
        if prefix.len() > tree.max_depth() {
            return InsertResult::DepthExceeded;
        }
        if !self.is_registered(&strategy) {
            trace!("strategy {} is not registered", strategy);
            return InsertResult::NotRegistered;
        }
        self.set_strategy(tree, measurements, prefix, strategy);
        InsertResult::Ok
    }

    /// Removes the choice for `prefix`, which then inherits from its parent.
    /// The root choice cannot be removed.
    pub fn erase(&mut self, tree: &mut NameTree, measurements: &mut Measurements, prefix: &Name) -> bool {
        if prefix.is_empty() {
            return false;
        }
        let Some((nte, handle)) = tree
            .find_exact_match(prefix)
            .and_then(|id| tree.get(id))
            .and_then(|entry| entry.strategy_choice_entry().map(|h| (entry.id(), h)))
        else {
            return false;
        };

        let parent_strategy = tree
            .get(nte)
            .and_then(|entry| entry.parent())
            .and_then(|parent| self.find_effective_strategy_from(tree, parent))
            .cloned();
        let Some(removed) = self.entries.remove(handle) else {
            return false;
        };
        if let Some(parent_strategy) = parent_strategy {
            self.change_strategy(tree, measurements, prefix, &removed.strategy, &parent_strategy);
        }

        if let Some(entry) = tree.get_mut(nte) {
            entry.set_strategy_choice_entry(None);
        }
        tree.erase_if_empty(nte);
        true
    }

    /// The strategy chosen exactly at `prefix`.
    pub fn get(&self, tree: &NameTree, prefix: &Name) -> Option<&Name> {
        let handle = tree
            .find_exact_match(prefix)
            .and_then(|id| tree.get(id))
            .and_then(|entry| entry.strategy_choice_entry())?;
        self.entries.get(handle).map(|e| e.strategy())
    }

    /// The strategy that governs `name`.
    pub fn find_effective_strategy(&self, tree: &NameTree, name: &Name) -> Option<&Name> {
        let handle = tree
            .find_longest_prefix_match_with(name, has_strategy_choice)
            .and_then(|id| tree.get(id))
            .and_then(|entry| entry.strategy_choice_entry())?;
        self.entries.get(handle).map(|e| e.strategy())
    }

    /// The strategy that governs a materialised entry.
    pub fn find_effective_strategy_from(&self, tree: &NameTree, id: EntryId) -> Option<&Name> {
        let handle = tree
            .find_longest_prefix_match_from(id, has_strategy_choice)
            .and_then(|id| tree.get(id))
            .and_then(|entry| entry.strategy_choice_entry())?;
        self.entries.get(handle).map(|e| e.strategy())
    }

    /// The entries whose effective strategy is the one chosen at `prefix`:
    /// `prefix` and its subtree, except where a deeper choice takes over.
    pub fn affected_entries(
        &self,
        tree: &NameTree,
        prefix: &Name,
    ) -> PartialEnumeration<impl FnMut(&Entry) -> (bool, bool)> {
        let root = tree.find_exact_match(prefix);
        PartialEnumeration::new(root, move |entry: &Entry| {
            if Some(entry.id()) != root && has_strategy_choice(entry) {
                (false, false)
            } else {
                (true, true)
            }
        })
    }

    fn set_strategy(&mut self, tree: &mut NameTree, measurements: &mut Measurements, prefix: &Name, strategy: Name) {
        let nte = tree.lookup(prefix);
        let existing = tree.get(nte).and_then(|entry| entry.strategy_choice_entry());

        let old_strategy = match existing.and_then(|h| self.entries.get_mut(h)) {
            Some(choice) => {
                if choice.strategy == strategy {
                    trace!("strategy for {} unchanged", prefix);
                    return;
                }
                Some(core::mem::replace(&mut choice.strategy, strategy.clone()))
            }
            None => {
                // A new choice takes over from whatever was inherited
                let inherited = self.find_effective_strategy_from(tree, nte).cloned();
                let handle = self
                    .entries
                    .insert(StrategyChoiceEntry::new(prefix.clone(), strategy.clone(), nte));
                if let Some(entry) = tree.get_mut(nte) {
                    entry.set_strategy_choice_entry(Some(handle));
                }
                inherited
            }
        };

        match old_strategy {
            Some(old_strategy) => self.change_strategy(tree, measurements, prefix, &old_strategy, &strategy),
            None => info!("strategy for {} set to {}", prefix, strategy),
        }
    }

    // Strategy state of the affected entries belongs to the old strategy
    fn change_strategy(
        &self,
        tree: &NameTree,
        measurements: &mut Measurements,
        prefix: &Name,
        old_strategy: &Name,
        new_strategy: &Name,
    ) {
        if old_strategy == new_strategy {
            return;
        }
        info!("strategy for {} changed from {} to {}", prefix, old_strategy, new_strategy);

        let mut affected = self.affected_entries(tree, prefix);
        while let Some(id) = affected.advance(tree) {
            let handle = tree.get(id).and_then(|entry| entry.measurements_entry());
            if let Some(m) = handle.and_then(|h| measurements.get_entry_mut(h)) {
                m.strategy_info = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tables::measurements::StrategyInfo, timestamp::Timestamp};

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    fn fixture() -> (NameTree, Measurements, StrategyChoice) {
        let mut nt = NameTree::default();
        let mut measurements = Measurements::default();
        let mut sc = StrategyChoice::new();
        sc.register_strategy(name("/strategy/P"));
        sc.register_strategy(name("/strategy/Q"));
        sc.set_default_strategy(&mut nt, &mut measurements, name("/strategy/default"));
        (nt, measurements, sc)
    }

    #[test]
    fn test_effective_strategy() {
        let (mut nt, mut m, mut sc) = fixture();
        assert_eq!(sc.len(), 1);
        assert_eq!(
            sc.find_effective_strategy(&nt, &name("/a/b")),
            Some(&name("/strategy/default"))
        );

        assert_eq!(sc.insert(&mut nt, &mut m, &name("/a"), name("/strategy/P")), InsertResult::Ok);
        assert_eq!(
            sc.insert(&mut nt, &mut m, &name("/a/b"), name("/strategy/Q/%FD%01")),
            InsertResult::Ok
        );
        assert_eq!(
            sc.insert(&mut nt, &mut m, &name("/a/c"), name("/strategy/unknown")),
            InsertResult::NotRegistered
        );
        assert_eq!(sc.len(), 3);

        assert_eq!(sc.get(&nt, &name("/a")), Some(&name("/strategy/P")));
        assert_eq!(sc.get(&nt, &name("/a/c")), None);
        assert_eq!(sc.find_effective_strategy(&nt, &name("/a/c/d")), Some(&name("/strategy/P")));
        assert_eq!(
            sc.find_effective_strategy(&nt, &name("/a/b/z")),
            Some(&name("/strategy/Q/%FD%01"))
        );

        assert!(sc.erase(&mut nt, &mut m, &name("/a/b")));
        assert!(!sc.erase(&mut nt, &mut m, &name("/a/b")));
        assert!(!sc.erase(&mut nt, &mut m, &Name::new()));
        assert_eq!(sc.find_effective_strategy(&nt, &name("/a/b/z")), Some(&name("/strategy/P")));
        assert_eq!(nt.find_exact_match(&name("/a/b")), None);
    }

    #[test]
    fn test_depth_exceeded() {
        let (mut nt, mut m, mut sc) = fixture();
        let deep = Name::from_components(
            (0..=nt.max_depth()).map(|i| crate::name::NameComponent::generic(&[i as u8])),
        );
        assert_eq!(
            sc.insert(&mut nt, &mut m, &deep, name("/strategy/P")),
            InsertResult::DepthExceeded
        );
    }

    #[test]
    fn test_affected_entries_stop_at_nested_choice() {
        let (mut nt, mut m, mut sc) = fixture();
        sc.insert(&mut nt, &mut m, &name("/a"), name("/strategy/P"));
        sc.insert(&mut nt, &mut m, &name("/a/b"), name("/strategy/Q"));
        nt.lookup(&name("/a/b/c"));
        nt.lookup(&name("/a/d/e"));

        let mut affected: Vec<String> = sc
            .affected_entries(&nt, &name("/a"))
            .entries(&nt)
            .map(|e| e.name().to_string())
            .collect();
        affected.sort();
        assert_eq!(affected, vec!["/a", "/a/d", "/a/d/e"]);
        assert_eq!(sc.affected_entries(&nt, &name("/zz")).entries(&nt).count(), 0);
    }

    #[test]
    fn test_change_clears_strategy_info() {
        let (mut nt, mut m, mut sc) = fixture();
        let now = Timestamp::from_ms(0);
        sc.insert(&mut nt, &mut m, &name("/a"), name("/strategy/P"));
        let below = m.get(&mut nt, &name("/a/x"), now);
        let outside = m.get(&mut nt, &name("/b"), now);
        for h in [below, outside] {
            m.get_entry_mut(h).unwrap().strategy_info = Some(StrategyInfo::default());
        }

        // Same strategy again changes nothing
        sc.insert(&mut nt, &mut m, &name("/a"), name("/strategy/P"));
        assert!(m.get_entry(below).unwrap().strategy_info.is_some());

        sc.insert(&mut nt, &mut m, &name("/a"), name("/strategy/Q"));
        assert!(m.get_entry(below).unwrap().strategy_info.is_none());
        assert!(m.get_entry(outside).unwrap().strategy_info.is_some());
    }
}
