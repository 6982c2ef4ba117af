//! Namespace package registry and metadata aggregation.
//!
//! Every package that owns database models registers a loader under its dotted name
//! (`tendril.inventory`, `acme.widgets`). [`get_metadata`] walks the packages under each
//! configured namespace prefix and lets each loader add its tables.

use crate::config::{ConfigManager, DATABASE_PACKAGE_PREFIXES};
use crate::error::{DbError, MetadataError};
use crate::metadata::model::MetaData;
use std::collections::{BTreeMap, HashSet};

/// Namespace that is always searched first.
pub const DEFAULT_PREFIX: &str = "tendril";

/// Packages never searched for models, together with their subpackages.
pub const EXCLUDED_PACKAGES: &[&str] = &["tendril.schema"];

pub type ModelLoader = Box<dyn Fn(&mut MetaData) -> Result<(), MetadataError> + Send + Sync>;

/// Known packages, each with its model loader if it has one.
#[derive(Default)]
pub struct PackageRegistry {
    packages: BTreeMap<String, Option<ModelLoader>>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package with a model loader. Re-registering a name replaces it.
    pub fn register<F>(&mut self, package: impl Into<String>, loader: F) -> &mut Self
    where
        F: Fn(&mut MetaData) -> Result<(), MetadataError> + Send + Sync + 'static,
    {
        self.packages.insert(package.into(), Some(Box::new(loader)));
        self
    }

    /// Register a package that has no database models.
    pub fn register_without_models(&mut self, package: impl Into<String>) -> &mut Self {
        self.packages.insert(package.into(), None);
        self
    }

    /// Package names in `prefix`'s namespace (the prefix itself and everything below it), sorted.
    pub fn namespace_packages(&self, prefix: &str) -> Vec<&str> {
        let nested = format!("{}.", prefix);
        self.packages
            .keys()
            .filter(|name| name.as_str() == prefix || name.starts_with(&nested))
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

fn is_excluded(package: &str) -> bool {
    EXCLUDED_PACKAGES.iter().any(|ex| {
        package == *ex
            || package
                .strip_prefix(ex)
                .map(|rest| rest.starts_with('.'))
                .unwrap_or(false)
    })
}

/// Populate metadata with the models of every package under [`DEFAULT_PREFIX`] and `prefixes`.
///
/// Each loader runs against a copy of the metadata so a failing package leaves no partial
/// tables behind. A package whose models fail to load ([`MetadataError::Load`]) is logged and
/// skipped. Any other error, such as two packages declaring the same table, is returned.
pub fn get_metadata(registry: &PackageRegistry, prefixes: &[String]) -> Result<MetaData, MetadataError> {
    let mut metadata = MetaData::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let all_prefixes = std::iter::once(DEFAULT_PREFIX).chain(prefixes.iter().map(String::as_str));

    for prefix in all_prefixes {
        for package in registry.namespace_packages(prefix) {
            if is_excluded(package) || !visited.insert(package) {
                continue;
            }
            let Some(Some(loader)) = registry.packages.get(package) else {
                tracing::debug!(package, "no DB models");
                continue;
            };
            let mut candidate = metadata.clone();
            match loader(&mut candidate) {
                Ok(()) => {
                    let added = candidate.len() - metadata.len();
                    metadata = candidate;
                    tracing::info!(package, tables = added, "loaded DB models");
                }
                Err(MetadataError::Load(reason)) => {
                    tracing::warn!(package, error = %reason, "skipping DB models that failed to load");
                }
                Err(e) => {
                    tracing::error!(package, error = %e, "conflicting DB models");
                    return Err(e);
                }
            }
        }
    }
    Ok(metadata)
}

/// [`get_metadata`] using `DATABASE_PACKAGE_PREFIXES` from loaded config.
pub fn get_metadata_from_config(
    registry: &PackageRegistry,
    mgr: &ConfigManager,
) -> Result<MetaData, DbError> {
    let prefixes = mgr.get_list(DATABASE_PACKAGE_PREFIXES)?;
    let prefixes: Vec<String> = prefixes.into_iter().filter(|p| !p.is_empty()).collect();
    Ok(get_metadata(registry, &prefixes)?)
}
