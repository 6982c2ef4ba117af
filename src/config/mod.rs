pub mod types;
pub mod options;
pub mod loader;
pub mod database;

pub use types::*;
pub use options::*;
pub use loader::*;
pub use database::*;
