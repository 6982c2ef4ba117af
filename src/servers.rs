//! Database server registry: one connection config per code in `DB_SERVER_CODES`.

use crate::config::{
    db_core_group, server_group, validate_server_code, ConfigManager, DatabaseConfig, DB_SERVER_CODES,
};
use crate::engine::init_db_engine;
use crate::error::{ConfigError, DbError};
use sqlx::PgPool;
use std::collections::BTreeMap;

/// Connection configs keyed by server code. The primary server has the blank code.
#[derive(Clone, Debug, Default)]
pub struct DatabaseServers {
    by_code: BTreeMap<String, DatabaseConfig>,
}

impl DatabaseServers {
    /// Load `DB_SERVER_CODES`, then the connection option group of every listed server.
    pub fn from_manager(mgr: &mut ConfigManager) -> Result<Self, ConfigError> {
        mgr.load_group(&db_core_group())?;
        let mut codes = mgr.get_list(DB_SERVER_CODES)?;
        if codes.is_empty() {
            codes.push(String::new());
        }

        let mut by_code = BTreeMap::new();
        for code in codes {
            let code = code.trim().to_uppercase();
            validate_server_code(&code)?;
            if by_code.contains_key(&code) {
                tracing::warn!(code = %code, "duplicate database server code, skipping");
                continue;
            }
            mgr.load_group(&server_group(&code)?)?;
            let config = DatabaseConfig::from_manager(mgr, &code)?;
            by_code.insert(code, config);
        }
        Ok(DatabaseServers { by_code })
    }

    /// Config for `code`, matched case-insensitively.
    pub fn get(&self, code: &str) -> Option<&DatabaseConfig> {
        self.by_code.get(&code.trim().to_uppercase())
    }

    pub fn primary(&self) -> Option<&DatabaseConfig> {
        self.get("")
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.by_code.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Engine for the server with `code`.
    pub fn engine(&self, code: &str) -> Result<PgPool, DbError> {
        let config = self.get(code).ok_or_else(|| {
            ConfigError::InvalidValue {
                name: DB_SERVER_CODES.to_string(),
                reason: format!("no database server with code '{}'", code),
            }
        })?;
        init_db_engine(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn manager(pairs: &[(&str, &str)]) -> ConfigManager {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigManager::new().with_env_lookup(move |n| map.get(n).cloned())
    }

    #[test]
    fn default_is_single_primary_server() {
        let mut mgr = manager(&[("DATABASE_HOST", "primary.local")]);
        let servers = DatabaseServers::from_manager(&mut mgr).unwrap();
        assert_eq!(servers.codes().collect::<Vec<_>>(), vec![""]);
        assert_eq!(servers.primary().unwrap().host.as_deref(), Some("primary.local"));
        assert!(mgr.is_loaded("db"));
    }

    #[test]
    fn each_code_reads_its_own_options() {
        let mut mgr = manager(&[
            ("DB_SERVER_CODES", r#"["", "ARCHIVE"]"#),
            ("DATABASE_HOST", "primary.local"),
            ("DATABASE_ARCHIVE_HOST", "archive.local"),
            ("DATABASE_ARCHIVE_PORT", "6432"),
        ]);
        let servers = DatabaseServers::from_manager(&mut mgr).unwrap();
        assert_eq!(servers.len(), 2);
        let archive = servers.get("ARCHIVE").unwrap();
        assert_eq!(archive.host.as_deref(), Some("archive.local"));
        assert_eq!(archive.port, 6432);
        assert_eq!(servers.primary().unwrap().port, 5432);
    }

    #[test]
    fn duplicate_codes_are_collapsed() {
        let mut mgr = manager(&[("DB_SERVER_CODES", ", ,ARCHIVE")]);
        let servers = DatabaseServers::from_manager(&mut mgr).unwrap();
        assert_eq!(servers.codes().collect::<Vec<_>>(), vec!["", "ARCHIVE"]);
    }

    #[test]
    fn codes_differing_in_case_are_one_server() {
        let mut mgr = manager(&[
            ("DB_SERVER_CODES", r#"["", "archive", "ARCHIVE"]"#),
            ("DATABASE_ARCHIVE_HOST", "archive.local"),
        ]);
        let servers = DatabaseServers::from_manager(&mut mgr).unwrap();
        assert_eq!(servers.codes().collect::<Vec<_>>(), vec!["", "ARCHIVE"]);
        assert_eq!(servers.get("archive").unwrap().host.as_deref(), Some("archive.local"));
    }

    #[test]
    fn invalid_code_is_rejected() {
        let mut mgr = manager(&[("DB_SERVER_CODES", r#"["arch-ive"]"#)]);
        assert!(matches!(
            DatabaseServers::from_manager(&mut mgr),
            Err(ConfigError::InvalidServerCode(_))
        ));
    }

    #[test]
    fn unknown_server_has_no_engine() {
        let mut mgr = manager(&[]);
        let servers = DatabaseServers::from_manager(&mut mgr).unwrap();
        assert!(matches!(servers.engine("NOPE"), Err(DbError::Config(_))));
    }
}
