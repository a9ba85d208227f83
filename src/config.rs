use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    name::Name,
    tables::{
        hashtable::HashtableOptions, measurements::DEFAULT_MEASUREMENTS_LIFETIME_MS,
        name_tree::DEFAULT_MAX_DEPTH, pit::DEFAULT_INTEREST_LIFETIME_MS,
    },
};

pub const DEFAULT_STRATEGY: &str = "/localhost/nfd/strategy/best-route";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameTreeOptions {
    #[serde(flatten)]
    pub hashtable: HashtableOptions,
    pub max_depth: usize,
}

impl Default for NameTreeOptions {
    fn default() -> Self {
        Self {
            hashtable: HashtableOptions::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl NameTreeOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::InvalidOption {
                option: "max_depth",
                reason: "must be positive".to_string(),
            });
        }
        self.hashtable.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    pub name_tree: NameTreeOptions,
    pub measurements_lifetime_ms: u64,
    pub pit_default_lifetime_ms: u64,
    pub default_strategy: String,
    /// Strategies that may be chosen besides the default.
    pub strategies: Vec<String>,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            name_tree: NameTreeOptions::default(),
            measurements_lifetime_ms: DEFAULT_MEASUREMENTS_LIFETIME_MS,
            pit_default_lifetime_ms: DEFAULT_INTEREST_LIFETIME_MS,
            default_strategy: DEFAULT_STRATEGY.to_string(),
            strategies: Vec::new(),
        }
    }
}

impl TablesConfig {
    /// Reads the config at `path`. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: TablesConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.name_tree.validate()?;
        if self.measurements_lifetime_ms == 0 {
            return Err(ConfigError::InvalidOption {
                option: "measurements_lifetime_ms",
                reason: "must be positive".to_string(),
            });
        }
        self.default_strategy()?;
        self.strategies()?;
        Ok(())
    }

    pub fn default_strategy(&self) -> Result<Name, ConfigError> {
        parse_strategy("default_strategy", &self.default_strategy)
    }

    pub fn strategies(&self) -> Result<Vec<Name>, ConfigError> {
        self.strategies
            .iter()
            .map(|s| parse_strategy("strategies", s))
            .collect()
    }
}

fn parse_strategy(option: &'static str, uri: &str) -> Result<Name, ConfigError> {
    match uri.parse::<Name>() {
        Ok(name) if !name.is_empty() => Ok(name),
        Ok(_) => Err(ConfigError::InvalidOption {
            option,
            reason: "strategy name must not be empty".to_string(),
        }),
        Err(err) => Err(ConfigError::InvalidOption {
            option,
            reason: err.to_string(),
        }),
    }
}
