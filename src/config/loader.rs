//! Load config option values from overrides, the environment, a JSON config file or defaults.

use crate::config::types::{ConfigGroup, ConfigOption, ConfigValue, OptionReport, ValueSource, MASK};
use crate::error::ConfigError;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

struct LoadedOption {
    option: ConfigOption,
    group: String,
    value: ConfigValue,
}

/// Registry of declared options and their effective values.
///
/// Precedence, highest first: explicit overrides, environment, config file, declared default.
pub struct ConfigManager {
    overrides: HashMap<String, String>,
    file_values: HashMap<String, String>,
    env_lookup: EnvLookup,
    groups: Vec<String>,
    loaded: HashMap<String, LoadedOption>,
    order: Vec<String>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        ConfigManager {
            overrides: HashMap::new(),
            file_values: HashMap::new(),
            env_lookup: Box::new(|name| std::env::var(name).ok()),
            groups: Vec::new(),
            loaded: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Read a JSON object of option name to value. Arrays are kept as JSON text so list
    /// options parse the same way as from the environment.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let Value::Object(map) = parsed else {
            return Err(ConfigError::Load(format!(
                "{}: expected a JSON object of option names",
                path.display()
            )));
        };
        for (name, value) in map {
            let raw = match value {
                Value::Null => continue,
                Value::String(s) => s,
                other => other.to_string(),
            };
            self.file_values.insert(name, raw);
        }
        tracing::debug!(path = %path.display(), "read config file");
        Ok(self)
    }

    pub fn with_override(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    /// Replace the environment lookup, e.g. with a fixed map in tests.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env_lookup = Box::new(lookup);
        self
    }

    /// Load `.env` from the working directory (or a parent) into the process environment.
    /// A missing file is not an error.
    pub fn load_env_file() {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "failed to load .env"),
        }
    }

    pub fn is_loaded(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Resolve and register every option of `group`. Loading a group twice is a no-op.
    pub fn load_group(&mut self, group: &ConfigGroup) -> Result<(), ConfigError> {
        if self.is_loaded(&group.name) {
            return Ok(());
        }
        if let Some(missing) = group.depends.iter().find(|d| !self.is_loaded(d)) {
            return Err(ConfigError::MissingDependency {
                group: group.name.clone(),
                missing: missing.clone(),
            });
        }
        tracing::debug!(group = %group.name, doc = %group.doc, "loading config group");
        for option in &group.options {
            let value = self.resolve(option);
            if !self.loaded.contains_key(&option.name) {
                self.order.push(option.name.clone());
            }
            self.loaded.insert(
                option.name.clone(),
                LoadedOption {
                    option: option.clone(),
                    group: group.name.clone(),
                    value,
                },
            );
        }
        self.groups.push(group.name.clone());
        Ok(())
    }

    fn resolve(&self, option: &ConfigOption) -> ConfigValue {
        let name = option.name.as_str();
        if let Some(v) = self.overrides.get(name) {
            return ConfigValue {
                raw: Some(v.clone()),
                source: ValueSource::Override,
            };
        }
        if let Some(v) = (self.env_lookup)(name) {
            return ConfigValue {
                raw: Some(v),
                source: ValueSource::Environment,
            };
        }
        if let Some(v) = self.file_values.get(name) {
            return ConfigValue {
                raw: Some(v.clone()),
                source: ValueSource::File,
            };
        }
        ConfigValue {
            raw: option.default.clone(),
            source: ValueSource::Default,
        }
    }

    fn entry(&self, name: &str) -> Result<&LoadedOption, ConfigError> {
        self.loaded
            .get(name)
            .ok_or_else(|| ConfigError::UnknownOption(name.to_string()))
    }

    /// Effective value as loaded, untrimmed. Blank text and the literal `None` count as unset.
    pub fn get(&self, name: &str) -> Result<Option<&str>, ConfigError> {
        let raw = self.entry(name)?.value.raw.as_deref();
        Ok(raw.filter(|v| {
            let v = v.trim();
            !v.is_empty() && v != "None"
        }))
    }

    pub fn require(&self, name: &str) -> Result<&str, ConfigError> {
        self.get(name)?
            .ok_or_else(|| ConfigError::MissingValue(name.to_string()))
    }

    pub fn get_parsed<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)?
            .map(|v| {
                v.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    /// List value: a JSON array of strings, or comma-separated text. Unset means empty.
    /// Unlike [`get`](Self::get), blank entries inside a list are kept (`[""]` is one blank code).
    pub fn get_list(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        let Some(raw) = self.get(name)?.map(str::trim) else {
            return Ok(Vec::new());
        };
        if raw.starts_with('[') {
            return serde_json::from_str::<Vec<String>>(raw).map_err(|e| ConfigError::InvalidValue {
                name: name.to_string(),
                reason: e.to_string(),
            });
        }
        Ok(raw.split(',').map(|s| s.trim().to_string()).collect())
    }

    pub fn source(&self, name: &str) -> Result<ValueSource, ConfigError> {
        Ok(self.entry(name)?.value.source)
    }

    /// Value safe to print: masked options show [`MASK`] instead of their value.
    pub fn display_value(&self, name: &str) -> Result<Option<String>, ConfigError> {
        let masked = self.entry(name)?.option.masked;
        Ok(self
            .get(name)?
            .map(|v| if masked { MASK.to_string() } else { v.to_string() }))
    }

    /// Every loaded option in declaration order, masked where required.
    pub fn describe(&self) -> Vec<OptionReport> {
        let mut seen = HashSet::new();
        self.order
            .iter()
            .filter(|n| seen.insert(n.as_str()))
            .filter_map(|name| {
                let entry = self.loaded.get(name)?;
                Some(OptionReport {
                    name: name.clone(),
                    group: entry.group.clone(),
                    doc: entry.option.doc.clone(),
                    value: self.display_value(name).ok().flatten(),
                    source: entry.value.source,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::options::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn loaded(mgr: ConfigManager) -> ConfigManager {
        let mut mgr = mgr;
        mgr.load_group(&db_core_group()).unwrap();
        mgr.load_group(&db_group()).unwrap();
        mgr
    }

    #[test]
    fn defaults_apply_when_nothing_configured() {
        let mgr = loaded(ConfigManager::new().with_env_lookup(env(&[])));
        assert_eq!(mgr.get(DATABASE_PORT).unwrap(), Some("5432"));
        assert_eq!(mgr.get(DATABASE_HOST).unwrap(), None);
        assert_eq!(mgr.source(DATABASE_PORT).unwrap(), ValueSource::Default);
        assert_eq!(mgr.get_list(DB_SERVER_CODES).unwrap(), vec![String::new()]);
        assert!(mgr.get_list(DATABASE_PACKAGE_PREFIXES).unwrap().is_empty());
    }

    #[test]
    fn override_beats_env_beats_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"DATABASE_HOST": "file-host", "DATABASE_USER": "file-user", "DATABASE_DB": "tendril", "DATABASE_PORT": 6543}}"#
        )
        .unwrap();
        let mgr = loaded(
            ConfigManager::new()
                .with_file(file.path())
                .unwrap()
                .with_env_lookup(env(&[("DATABASE_HOST", "env-host"), ("DATABASE_USER", "env-user")]))
                .with_override(DATABASE_HOST, "override-host"),
        );
        assert_eq!(mgr.get(DATABASE_HOST).unwrap(), Some("override-host"));
        assert_eq!(mgr.source(DATABASE_HOST).unwrap(), ValueSource::Override);
        assert_eq!(mgr.get(DATABASE_USER).unwrap(), Some("env-user"));
        assert_eq!(mgr.source(DATABASE_USER).unwrap(), ValueSource::Environment);
        assert_eq!(mgr.get(DATABASE_DB).unwrap(), Some("tendril"));
        assert_eq!(mgr.get_parsed::<u16>(DATABASE_PORT).unwrap(), Some(6543));
        assert_eq!(mgr.source(DATABASE_PORT).unwrap(), ValueSource::File);
    }

    #[test]
    fn literal_none_counts_as_unset() {
        let mgr = loaded(ConfigManager::new().with_env_lookup(env(&[("DATABASE_HOST", "None")])));
        assert_eq!(mgr.get(DATABASE_HOST).unwrap(), None);
        assert!(matches!(
            mgr.require(DATABASE_HOST),
            Err(ConfigError::MissingValue(n)) if n == DATABASE_HOST
        ));
    }

    #[test]
    fn lists_parse_from_json_or_commas() {
        let mgr = loaded(ConfigManager::new().with_env_lookup(env(&[
            ("DB_SERVER_CODES", r#"["", "ARCHIVE"]"#),
            ("DATABASE_PACKAGE_PREFIXES", "acme, widgets"),
        ])));
        assert_eq!(mgr.get_list(DB_SERVER_CODES).unwrap(), vec!["", "ARCHIVE"]);
        assert_eq!(mgr.get_list(DATABASE_PACKAGE_PREFIXES).unwrap(), vec!["acme", "widgets"]);
    }

    #[test]
    fn invalid_port_is_reported_with_option_name() {
        let mgr = loaded(ConfigManager::new().with_env_lookup(env(&[("DATABASE_PORT", "not-a-port")])));
        match mgr.get_parsed::<u16>(DATABASE_PORT) {
            Err(ConfigError::InvalidValue { name, .. }) => assert_eq!(name, DATABASE_PORT),
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn group_requires_its_dependencies() {
        let mut mgr = ConfigManager::new().with_env_lookup(env(&[]));
        let err = mgr.load_group(&db_group()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDependency { ref missing, .. } if missing == DB_CORE_GROUP));
        assert!(matches!(mgr.get(DATABASE_HOST), Err(ConfigError::UnknownOption(_))));
    }

    #[test]
    fn password_is_masked_in_reports() {
        let mgr = loaded(ConfigManager::new().with_env_lookup(env(&[("DATABASE_PASS", "hunter2")])));
        assert_eq!(mgr.require(DATABASE_PASS).unwrap(), "hunter2");
        assert_eq!(mgr.display_value(DATABASE_PASS).unwrap().as_deref(), Some(MASK));
        let report = mgr.describe();
        assert_eq!(report.len(), 7);
        let pass = report.iter().find(|r| r.name == DATABASE_PASS).unwrap();
        assert_eq!(pass.value.as_deref(), Some(MASK));
        let dump = serde_json::to_string(&report).unwrap();
        assert!(!dump.contains("hunter2"));
    }

    #[test]
    fn file_must_be_an_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2]").unwrap();
        assert!(matches!(ConfigManager::new().with_file(file.path()), Err(ConfigError::Load(_))));
    }
}
