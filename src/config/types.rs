//! Config option declarations: name, default, documentation and masking.

use serde::Serialize;

/// Placeholder shown instead of the value of a masked option.
pub const MASK: &str = "****";

/// A named, defaulted, documented setting.
///
/// `default` is the raw string form of the value; `None` means the option has
/// no value unless one is configured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigOption {
    pub name: String,
    pub default: Option<String>,
    pub doc: String,
    /// Value must never be shown in logs or config dumps (passwords).
    pub masked: bool,
}

impl ConfigOption {
    pub fn new(name: impl Into<String>, default: Option<&str>, doc: impl Into<String>) -> Self {
        ConfigOption {
            name: name.into(),
            default: default.map(str::to_string),
            doc: doc.into(),
            masked: false,
        }
    }

    pub fn masked(mut self) -> Self {
        self.masked = true;
        self
    }
}

/// A set of options loaded together, e.g. everything needed to reach one database server.
#[derive(Clone, Debug)]
pub struct ConfigGroup {
    pub name: String,
    pub doc: String,
    /// Groups that must already be loaded before this one.
    pub depends: Vec<String>,
    pub options: Vec<ConfigOption>,
}

impl ConfigGroup {
    pub fn new(name: impl Into<String>, doc: impl Into<String>, options: Vec<ConfigOption>) -> Self {
        ConfigGroup {
            name: name.into(),
            doc: doc.into(),
            depends: Vec::new(),
            options,
        }
    }

    pub fn depends_on(mut self, group: impl Into<String>) -> Self {
        self.depends.push(group.into());
        self
    }
}

/// Where the effective value of an option came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Override,
    Environment,
    File,
    Default,
}

/// Effective value of one option after loading.
#[derive(Clone, Debug)]
pub struct ConfigValue {
    pub raw: Option<String>,
    pub source: ValueSource,
}

/// One line of a config dump. Masked values are already replaced by [`MASK`].
#[derive(Clone, Debug, Serialize)]
pub struct OptionReport {
    pub name: String,
    pub group: String,
    pub doc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub source: ValueSource,
}
