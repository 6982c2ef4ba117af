//! Typed errors for config loading, model metadata and database access.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown config option: {0}")]
    UnknownOption(String),
    #[error("missing value for config option {0}")]
    MissingValue(String),
    #[error("invalid value for config option {name}: {reason}")]
    InvalidValue { name: String, reason: String },
    #[error("config group '{group}' depends on '{missing}', which is not loaded")]
    MissingDependency { group: String, missing: String },
    #[error("invalid database server code: '{0}'")]
    InvalidServerCode(String),
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("table '{0}' is already defined in this metadata")]
    DuplicateTable(String),
    #[error("table '{table}' column '{column}' references unknown table '{target}'")]
    UnknownReference {
        table: String,
        column: String,
        target: String,
    },
    #[error("model load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}
