//! Tendril database layer: config options, engine, scoped sessions and model metadata.
//!
//! Initialization runs in order: config → engine → sessions → metadata.

pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod servers;
pub mod session;
pub mod uri;

pub use config::{ConfigManager, ConfigOption, DatabaseConfig};
pub use engine::{ensure_database_exists, init_db_engine, init_db_engine_with, Database, EngineOptions};
pub use error::{ConfigError, DbError, MetadataError};
pub use metadata::{commit_metadata, get_metadata, get_metadata_from_config, MetaData, PackageRegistry, TableDef, ColumnDef};
pub use servers::DatabaseServers;
pub use session::{get_session, with_session, SessionFactory};
pub use uri::{build_db_uri, redact_db_uri};
