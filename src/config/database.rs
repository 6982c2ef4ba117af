//! Typed connection settings for one database server, resolved from loaded options.

use crate::config::loader::ConfigManager;
use crate::config::options::*;
use crate::error::ConfigError;
use crate::uri::{build_db_uri, redact_db_uri};
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Server code; blank for the primary server.
    pub code: String,
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl DatabaseConfig {
    /// Read the connection options of server `code`. The matching group must be loaded.
    pub fn from_manager(mgr: &ConfigManager, code: &str) -> Result<Self, ConfigError> {
        let name = |base: &str| server_option_name(base, code);
        let owned = |v: Option<&str>| v.map(str::to_string);
        Ok(DatabaseConfig {
            code: code.to_string(),
            host: owned(mgr.get(&name(DATABASE_HOST))?),
            port: mgr
                .get_parsed::<u16>(&name(DATABASE_PORT))?
                .unwrap_or(DEFAULT_PORT),
            user: owned(mgr.get(&name(DATABASE_USER))?),
            password: owned(mgr.get(&name(DATABASE_PASS))?),
            database: owned(mgr.get(&name(DATABASE_DB))?),
        })
    }

    /// Connection URI. Host, user and database are required; a missing password is empty.
    pub fn uri(&self) -> Result<String, ConfigError> {
        let required = |v: &Option<String>, base: &str| {
            v.clone()
                .ok_or_else(|| ConfigError::MissingValue(server_option_name(base, &self.code)))
        };
        let host = required(&self.host, DATABASE_HOST)?;
        let user = required(&self.user, DATABASE_USER)?;
        let database = required(&self.database, DATABASE_DB)?;
        Ok(build_db_uri(
            &host,
            self.port,
            &user,
            self.password.as_deref().unwrap_or(""),
            &database,
        ))
    }

    pub fn redacted_uri(&self) -> Result<String, ConfigError> {
        self.uri().map(|u| redact_db_uri(&u))
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("code", &self.code)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| crate::config::MASK))
            .field("database", &self.database)
            .finish()
    }
}
