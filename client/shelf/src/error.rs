use thiserror::Error;

use crate::model::CollectionKind;

/// Input refused before the store or the network is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Rating must be between 0.5 and 10, got {0}")]
    OutOfRange(f64),

    #[error("Rating must be a multiple of 0.5, got {0}")]
    OffStep(f64),

    #[error("Rating must be a number")]
    NotFinite,

    #[error("The {0} collection cannot be toggled")]
    NotToggleable(CollectionKind),

    #[error("Unknown collection {0:?}")]
    UnknownKind(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Failed to read secret {name}: {source}")]
    Secret {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ShelfError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
