pub mod arena;
pub mod entry;
pub mod enumerate;
pub mod fib;
pub mod hashtable;
pub mod measurements;
pub mod name_tree;
pub mod pit;
pub mod strategy_choice;

use log::debug;

use crate::{
    config::TablesConfig, error::ConfigError, name::Name, timestamp::Timestamp,
};

use self::{
    fib::Fib, measurements::Measurements, name_tree::NameTree, pit::Pit,
    strategy_choice::StrategyChoice,
};

/// Identifies a face to the tables. Faces themselves live elsewhere.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FaceToken(pub u32);

/// The tables of one forwarder, all indexed by the same name tree.
pub struct Tables {
    pub name_tree: NameTree,
    pub fib: Fib,
    pub pit: Pit,
    pub measurements: Measurements,
    pub strategy_choice: StrategyChoice,
}

impl Tables {
    pub fn new(config: &TablesConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut tables = Self {
            name_tree: NameTree::new(config.name_tree.clone())?,
            fib: Fib::new(),
            pit: Pit::new(config.pit_default_lifetime_ms),
            measurements: Measurements::new(config.measurements_lifetime_ms),
            strategy_choice: StrategyChoice::new(),
        };
        for strategy in config.strategies()? {
            tables.strategy_choice.register_strategy(strategy);
        }
        tables.set_default_strategy(config.default_strategy()?);
        Ok(tables)
    }

    pub fn set_default_strategy(&mut self, strategy: Name) {
        self.strategy_choice
            .set_default_strategy(&mut self.name_tree, &mut self.measurements, strategy);
    }

    /// Removes the face from all FIB and PIT entries.
    pub fn remove_face(&mut self, face: FaceToken) {
        let fib_erased = self.fib.remove_face(&mut self.name_tree, face);
        let pit_erased = self.pit.remove_face(&mut self.name_tree, face);
        debug!(
            "removed {:?}: {} FIB and {} PIT entries erased",
            face, fib_erased, pit_erased
        );
    }

    /// Drops expired PIT and Measurements entries.
    pub fn prune_if_needed(&mut self, now: Timestamp) {
        let pit_erased = self.pit.prune_expired(&mut self.name_tree, now);
        let measurements_erased = self.measurements.cleanup_expired(&mut self.name_tree, now);
        if pit_erased + measurements_erased > 0 {
            debug!(
                "pruned {} PIT and {} Measurements entries",
                pit_erased, measurements_erased
            );
        }
    }
}
