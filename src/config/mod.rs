//! Configuration Management
//!
//! This module loads the database location, list defaults and the entity registry.
//!
//! # Configuration Locations
//! - Local: `.tabulum/config.json` (team-shareable, per-project)
//! - Global: `~/.config/tabulum/config.json` (per-user)
//! - Explicit: `--config <PATH>` (replaces both)
//!
//! # Resolution Precedence
//! 1. Command-line options (highest priority, applied by the list command)
//! 2. Local config file
//! 3. Global config file
//! 4. Built-in defaults
//!
//! Entities merge by name, the local definition replacing the global one.
//! Every other setting overrides key by key.
//!
//! # Example
//! ```json
//! {
//!   "database": "var/app.db",
//!   "defaults": { "entity": "App\\Entity\\User", "limit": 20, "associations_ignore": false },
//!   "entities": {
//!     "App\\Entity\\User": {
//!       "table": "users",
//!       "display": "{name}",
//!       "associations": [
//!         { "name": "posts", "kind": "one_to_many", "target": "App\\Entity\\Post", "mapped_by": "user_id" }
//!       ]
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::AssociationMapping;
use crate::error::{Result, TabulumError};
use crate::projection::validate_date_format;

/// Default translation table (one row per translated field)
pub const DEFAULT_TRANSLATION_TABLE: &str = "ext_translations";

/// Locale whose values live in the entity tables themselves
pub const DEFAULT_LOCALE: &str = "en";

/// Registered entity definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// Backing table
    pub table: String,

    /// Primary key column (default: declared table primary key, then `id`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    /// Listed fields in order (default: every table column except to-one join columns)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,

    /// Fields holding dates stored as text or unix seconds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub date_fields: Vec<String>,

    /// Display template used when this entity is rendered as a related record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    /// Fields read from the translation table when a non-default locale is active
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translatable: Vec<String>,

    /// Associations in header order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associations: Vec<AssociationMapping>,
}

impl EntityDefinition {
    /// Create a definition for `table` with every other setting defaulted
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: None,
            fields: None,
            date_fields: Vec::new(),
            display: None,
            translatable: Vec::new(),
            associations: Vec::new(),
        }
    }
}

/// Defaults for list options (each one overridable on the command line)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDefaults {
    /// Entity listed when none is named on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associations_ignore: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associations_limit: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl ListDefaults {
    fn merge(self, over: Self) -> Self {
        Self {
            entity: over.entity.or(self.entity),
            limit: over.limit.or(self.limit),
            offset: over.offset.or(self.offset),
            associations_ignore: over.associations_ignore.or(self.associations_ignore),
            associations_limit: over.associations_limit.or(self.associations_limit),
            date_format: over.date_format.or(self.date_format),
            locale: over.locale.or(self.locale),
        }
    }
}

/// Translation storage settings as written in config files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_locale: Option<String>,
}

/// Resolved translation storage settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationSettings {
    /// Table with `locale`, `object_class`, `field`, `foreign_key`, `content` columns
    pub table: String,

    /// Locale stored in the entity tables
    pub default_locale: String,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self { table: DEFAULT_TRANSLATION_TABLE.to_string(), default_locale: DEFAULT_LOCALE.to_string() }
    }
}

/// Complete configuration (one file, or several merged)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabulumConfig {
    /// `SQLite` database file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    #[serde(default)]
    pub defaults: ListDefaults,

    #[serde(default)]
    pub translations: TranslationConfig,

    /// Registered entities by identifier
    #[serde(default)]
    pub entities: BTreeMap<String, EntityDefinition>,
}

impl TabulumConfig {
    /// Merge `over` on top of `self` (`over` wins)
    #[must_use]
    pub fn merge(mut self, over: Self) -> Self {
        self.entities.extend(over.entities);
        Self {
            database: over.database.or(self.database),
            defaults: self.defaults.merge(over.defaults),
            translations: TranslationConfig {
                table: over.translations.table.or(self.translations.table),
                default_locale: over.translations.default_locale.or(self.translations.default_locale),
            },
            entities: self.entities,
        }
    }

    /// Translation settings with built-in defaults applied
    #[must_use]
    pub fn translation_settings(&self) -> TranslationSettings {
        let defaults = TranslationSettings::default();
        TranslationSettings {
            table: self.translations.table.clone().unwrap_or(defaults.table),
            default_locale: self
                .translations
                .default_locale
                .clone()
                .unwrap_or(defaults.default_locale),
        }
    }

    /// Check the entity registry and defaults for inconsistencies
    pub fn validate(&self) -> Result<()> {
        if let Some(pattern) = &self.defaults.date_format {
            validate_date_format(pattern)
                .map_err(|e| TabulumError::config_error(format!("defaults.date_format: {e}")))?;
        }

        for (name, entity) in &self.entities {
            if entity.table.trim().is_empty() {
                return Err(TabulumError::config_error(format!(
                    "Entity '{name}' has an empty table name"
                )));
            }

            let mut seen = HashSet::new();
            for association in &entity.associations {
                association.validate(name)?;

                if !self.entities.contains_key(&association.target) {
                    return Err(TabulumError::config_error(format!(
                        "Association '{}' of entity '{name}' targets unregistered entity '{}'",
                        association.name, association.target
                    )));
                }

                if !seen.insert(association.name.as_str()) {
                    return Err(TabulumError::config_error(format!(
                        "Entity '{name}' declares association '{}' twice",
                        association.name
                    )));
                }
            }

            if let Some(fields) = &entity.fields {
                if let Some(clash) = fields.iter().find(|f| seen.contains(f.as_str())) {
                    return Err(TabulumError::config_error(format!(
                        "Entity '{name}' declares '{clash}' as both field and association"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Get path to local config file (`.tabulum/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        TabulumError::config_error(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".tabulum").join("config.json"))
}

/// Get path to global config file (`~/.config/tabulum/config.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| TabulumError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join("tabulum").join("config.json"))
}

/// Directory relative database paths are resolved against
///
/// For `.tabulum/config.json` this is the project root; for any other file it
/// is the directory containing the file.
fn base_dir(path: &Path) -> Option<&Path> {
    let parent = path.parent()?;
    if parent.file_name().is_some_and(|name| name == ".tabulum") {
        parent.parent()
    } else {
        Some(parent)
    }
}

/// Load one config file
///
/// A missing file yields an empty configuration. A relative `database` path is
/// made absolute against the file's base directory.
pub fn load_config_file(path: &Path) -> Result<TabulumConfig> {
    if !path.exists() {
        return Ok(TabulumConfig::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| TabulumError::config_error(format!("Could not read config file: {e}")))?;

    let mut config = serde_json::from_str::<TabulumConfig>(&contents).map_err(|e| {
        TabulumError::config_error(format!("Invalid config file {}: {e}", path.display()))
    })?;

    if let (Some(database), Some(base)) = (&config.database, base_dir(path)) {
        if database.is_relative() {
            config.database = Some(base.join(database));
        }
    }

    tracing::debug!(path = %path.display(), entities = config.entities.len(), "loaded config file");
    Ok(config)
}

/// Load global then local configuration, local taking precedence
pub fn load_with_precedence() -> Result<TabulumConfig> {
    let global = load_config_file(&global_config_path()?)?;
    let local = load_config_file(&local_config_path()?)?;
    Ok(global.merge(local))
}

/// Load the effective configuration
///
/// An explicit path replaces the local/global lookup entirely. The result is
/// validated before it is returned.
pub fn load(explicit: Option<&Path>) -> Result<TabulumConfig> {
    let config = match explicit {
        Some(path) if !path.exists() => {
            return Err(TabulumError::config_error(format!(
                "Config file {} not found",
                path.display()
            )));
        }
        Some(path) => load_config_file(path)?,
        None => load_with_precedence()?,
    };

    config.validate()?;
    Ok(config)
}
