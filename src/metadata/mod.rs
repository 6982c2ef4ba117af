//! Model metadata: table definitions, aggregation across namespace packages, and schema creation.

pub mod ddl;
pub mod model;
pub mod registry;

pub use ddl::{commit_metadata, commit_metadata_with, create_table_sql, creation_order, schema_statements};
pub use model::{touch_updated_at, ColumnDef, MetaData, TableDef};
pub use registry::{get_metadata, get_metadata_from_config, ModelLoader, PackageRegistry, DEFAULT_PREFIX, EXCLUDED_PACKAGES};
