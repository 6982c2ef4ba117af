//! Database config option declarations.
//!
//! These names and defaults are the durable contract with deployments: they are
//! read from the environment or the instance config file.

use crate::config::types::{ConfigGroup, ConfigOption};
use crate::error::ConfigError;
use regex::Regex;
use std::sync::OnceLock;

pub const DB_CORE_GROUP: &str = "db_core";
pub const DB_GROUP: &str = "db";

pub const DB_SERVER_CODES: &str = "DB_SERVER_CODES";
pub const DATABASE_HOST: &str = "DATABASE_HOST";
pub const DATABASE_PORT: &str = "DATABASE_PORT";
pub const DATABASE_USER: &str = "DATABASE_USER";
pub const DATABASE_PASS: &str = "DATABASE_PASS";
pub const DATABASE_DB: &str = "DATABASE_DB";
pub const DATABASE_PACKAGE_PREFIXES: &str = "DATABASE_PACKAGE_PREFIXES";

pub const DEFAULT_PORT: u16 = 5432;

/// `DB_SERVER_CODES`: one code per database server. The primary server has the blank code.
pub fn db_core_group() -> ConfigGroup {
    ConfigGroup::new(
        DB_CORE_GROUP,
        "Database Core Configuration",
        vec![ConfigOption::new(
            DB_SERVER_CODES,
            Some(r#"[""]"#),
            "Database Server Codes, one for each DB Server for which configuration is to be \
             provided. The primary database server has a blank code (''). No existing \
             functionality requires multiple databases, so this option can usually be ignored.",
        )],
    )
}

/// Connection options of the primary server plus `DATABASE_PACKAGE_PREFIXES`.
pub fn db_group() -> ConfigGroup {
    let mut options = connection_options("");
    options.push(ConfigOption::new(
        DATABASE_PACKAGE_PREFIXES,
        None,
        "List of package namespaces other than 'tendril' to search for DB models.",
    ));
    ConfigGroup::new(DB_GROUP, "Database Configuration", options).depends_on(DB_CORE_GROUP)
}

/// Connection options for the server with `code`. The blank code is the primary server,
/// which is covered by [`db_group`].
pub fn server_group(code: &str) -> Result<ConfigGroup, ConfigError> {
    validate_server_code(code)?;
    if code.is_empty() {
        return Ok(db_group());
    }
    Ok(ConfigGroup::new(
        server_group_name(code),
        format!("Database Configuration for server '{}'", code),
        connection_options(code),
    )
    .depends_on(DB_CORE_GROUP))
}

pub fn server_group_name(code: &str) -> String {
    if code.is_empty() {
        DB_GROUP.to_string()
    } else {
        format!("{}_{}", DB_GROUP, code.to_lowercase())
    }
}

/// Option name of `base` (e.g. `DATABASE_HOST`) for the server with `code`.
/// `("DATABASE_HOST", "ARCHIVE")` -> `DATABASE_ARCHIVE_HOST`.
pub fn server_option_name(base: &str, code: &str) -> String {
    if code.is_empty() {
        return base.to_string();
    }
    let suffix = base.strip_prefix("DATABASE_").unwrap_or(base);
    format!("DATABASE_{}_{}", code.to_uppercase(), suffix)
}

pub fn validate_server_code(code: &str) -> Result<(), ConfigError> {
    static CODE_RE: OnceLock<Regex> = OnceLock::new();
    let re = CODE_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]*$").expect("valid regex"));
    if re.is_match(code) {
        Ok(())
    } else {
        Err(ConfigError::InvalidServerCode(code.to_string()))
    }
}

fn connection_options(code: &str) -> Vec<ConfigOption> {
    vec![
        ConfigOption::new(
            server_option_name(DATABASE_HOST, code),
            None,
            "The database server host.",
        ),
        ConfigOption::new(
            server_option_name(DATABASE_PORT, code),
            Some("5432"),
            "The database server port.",
        ),
        ConfigOption::new(
            server_option_name(DATABASE_USER, code),
            None,
            "The username to login to the database server.",
        ),
        ConfigOption::new(
            server_option_name(DATABASE_PASS, code),
            None,
            "The password to login to the database server.",
        )
        .masked(),
        ConfigOption::new(
            server_option_name(DATABASE_DB, code),
            None,
            "The name of the database.",
        ),
    ]
}
