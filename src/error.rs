use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("name component type {0} is out of range")]
    InvalidComponentType(u64),
    #[error("invalid percent-encoding in component {0:?}")]
    InvalidPercentEncoding(String),
    #[error("invalid digest component {0:?}")]
    InvalidDigest(String),
    #[error("component {0:?} is not allowed in a name URI")]
    InvalidComponent(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid option {option}: {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("prefix has {len} components, more than the maximum depth of {max_depth}")]
    DepthExceeded { len: usize, max_depth: usize },
}
