//! List Command
//!
//! Drives one listing run against an [`EntitySource`]:
//!
//! ```text
//! type exists? -> recognized entity? -> pre-fetch hooks -> metadata
//!     -> fetch page -> project each instance -> Table
//! ```
//!
//! The two validation steps are the only user-facing failures. Everything after
//! them propagates its error and aborts the run without a partial table.
//!
//! The translatable variant is the same command with a [`LocaleHook`] installed.

use crate::config::{ListDefaults, DEFAULT_LOCALE};
use crate::engine::{EntitySource, PageRequest, Translatable};
use crate::error::{Result, TabulumError};
use crate::metadata::{compute_field_list, DEFAULT_DATE_FORMAT};
use crate::output::Table;
use crate::projection::{project_row, ProjectionConfig, DEFAULT_ASSOCIATIONS_LIMIT};

/// Default page size
pub const DEFAULT_LIMIT: usize = 10;

/// Default number of instances to skip
pub const DEFAULT_OFFSET: usize = 0;

/// Default locale for `list-translatable`
pub const DEFAULT_TRANSLATABLE_LOCALE: &str = "en_US";

/// Fully resolved options of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Entity identifier to list
    pub entity: String,
    pub limit: usize,
    pub offset: usize,
    pub projection: ProjectionConfig,

    /// Locale applied by `list-translatable`
    pub locale: String,
}

impl ListOptions {
    /// Options with every value at its built-in default
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
            projection: ProjectionConfig::default(),
            locale: DEFAULT_TRANSLATABLE_LOCALE.to_string(),
        }
    }

    /// Resolve options: explicit values, then configured defaults, then built-ins
    ///
    /// The entity has no built-in default; it must come from `overrides` or
    /// `defaults`. Fails on a date pattern chrono cannot format.
    pub fn resolve(overrides: &ListDefaults, defaults: &ListDefaults) -> Result<Self> {
        let entity = overrides.entity.clone().or_else(|| defaults.entity.clone()).ok_or_else(|| {
            TabulumError::invalid_input("No entity given. Pass <ENTITY> or set defaults.entity")
        })?;

        let options = Self {
            entity,
            limit: overrides.limit.or(defaults.limit).unwrap_or(DEFAULT_LIMIT),
            offset: overrides.offset.or(defaults.offset).unwrap_or(DEFAULT_OFFSET),
            projection: ProjectionConfig {
                ignore_associations: overrides
                    .associations_ignore
                    .or(defaults.associations_ignore)
                    .unwrap_or(true),
                associations_limit: overrides
                    .associations_limit
                    .or(defaults.associations_limit)
                    .unwrap_or(DEFAULT_ASSOCIATIONS_LIMIT),
                date_format: overrides
                    .date_format
                    .clone()
                    .or_else(|| defaults.date_format.clone())
                    .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string()),
            },
            locale: overrides
                .locale
                .clone()
                .or_else(|| defaults.locale.clone())
                .unwrap_or_else(|| DEFAULT_TRANSLATABLE_LOCALE.to_string()),
        };

        options.projection.validate()?;
        Ok(options)
    }

    /// Page request for these options
    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            entity: self.entity.clone(),
            limit: self.limit,
            offset: self.offset,
            with_associations: !self.projection.ignore_associations,
        }
    }
}

/// Adjusts the data source after validation and before anything is fetched
pub trait PrefetchHook<S>: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn before_fetch(&self, source: &mut S) -> Result<()>;
}

/// Sets the translation locale of the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleHook {
    pub locale: String,
    pub default_locale: String,
}

impl LocaleHook {
    /// Hook reading translations in `locale`, with the built-in default locale
    pub fn new(locale: impl Into<String>) -> Self {
        Self { locale: locale.into(), default_locale: DEFAULT_LOCALE.to_string() }
    }

    #[must_use]
    pub fn with_default_locale(mut self, default_locale: impl Into<String>) -> Self {
        self.default_locale = default_locale.into();
        self
    }
}

impl<S: Translatable> PrefetchHook<S> for LocaleHook {
    fn name(&self) -> &'static str {
        "locale"
    }

    fn before_fetch(&self, source: &mut S) -> Result<()> {
        source.set_default_locale(&self.default_locale);
        source.set_translatable_locale(&self.locale);
        Ok(())
    }
}

/// The list command over one entity source
pub struct ListCommand<S> {
    source: S,
    hooks: Vec<Box<dyn PrefetchHook<S>>>,
}

impl<S: EntitySource> ListCommand<S> {
    pub fn new(source: S) -> Self {
        Self { source, hooks: Vec::new() }
    }

    /// Install a pre-fetch hook; hooks run in installation order
    #[must_use]
    pub fn with_hook(mut self, hook: Box<dyn PrefetchHook<S>>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Engine name of the underlying source
    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.source.engine_name()
    }

    /// Run the listing and return the projected table
    pub async fn execute(&mut self, options: &ListOptions) -> Result<Table> {
        let entity = options.entity.as_str();

        if !self.source.type_exists(entity).await? {
            return Err(TabulumError::entity_not_found(entity));
        }
        if !self.source.is_entity(entity).await? {
            return Err(TabulumError::not_an_entity(entity));
        }

        for hook in &self.hooks {
            tracing::debug!(hook = hook.name(), entity, "running pre-fetch hook");
            hook.before_fetch(&mut self.source)?;
        }

        let metadata = self.source.metadata(entity).await?;
        let fields = compute_field_list(&metadata);

        let instances = self.source.fetch(&options.page_request()).await?;

        let rows = instances
            .iter()
            .map(|instance| project_row(&metadata, instance, &fields, &options.projection))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            engine = self.source.engine_name(),
            entity,
            limit = options.limit,
            offset = options.offset,
            rows = rows.len(),
            "listed entity instances"
        );

        Ok(Table::new(fields, rows))
    }
}
