//! Entity Sources and Core Types
//!
//! This module defines the data-source abstraction the list command runs against.
//! Each source (`SQLite`, in-memory) implements the [`EntitySource`] trait.
//!
//! # Responsibilities of a source
//! - Tell whether an identifier names a known type at all
//! - Tell whether that type is a registered entity
//! - Describe a registered entity ([`EntityDescriptor`])
//! - Fetch an ordered page of hydrated [`Record`]s, associations included
//!
//! Associations are resolved into [`AssociationValue`]s while hydrating, so the
//! projector only ever reads finished records.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabulumError};
use crate::metadata::{AssociationValue, EntityMetadata, TextRepresentation, Value};

pub mod memory;
pub mod sqlite;

/// Association cardinality and owning side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// Owning side holds `join_column` referencing the target primary key
    ManyToOne,
    /// Same storage as `ManyToOne`, at most one record on each side
    OneToOne,
    /// Target holds `mapped_by` referencing this primary key
    OneToMany,
    /// Linked through `join_table`
    ManyToMany,
}

impl AssociationKind {
    /// Whether the association resolves to at most one record
    #[must_use]
    pub const fn is_to_one(&self) -> bool {
        matches!(self, Self::ManyToOne | Self::OneToOne)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ManyToOne => "many_to_one",
            Self::OneToOne => "one_to_one",
            Self::OneToMany => "one_to_many",
            Self::ManyToMany => "many_to_many",
        }
    }
}

impl std::fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Link table for many-to-many associations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTable {
    /// Link table name
    pub name: String,

    /// Column referencing the owning entity's primary key
    pub join_column: String,

    /// Column referencing the target entity's primary key
    pub inverse_join_column: String,
}

/// How one association is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationMapping {
    /// Association name (header column)
    pub name: String,

    pub kind: AssociationKind,

    /// Target entity name (must be registered)
    pub target: String,

    /// Foreign key column on this entity (to-one associations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_column: Option<String>,

    /// Foreign key column on the target entity (one-to-many)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapped_by: Option<String>,

    /// Link table (many-to-many)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table: Option<JoinTable>,
}

impl AssociationMapping {
    /// Create a mapping with no storage details
    pub fn new(name: impl Into<String>, kind: AssociationKind, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            join_column: None,
            mapped_by: None,
            join_table: None,
        }
    }

    /// Create a many-to-one mapping through `join_column`
    pub fn many_to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        join_column: impl Into<String>,
    ) -> Self {
        Self {
            join_column: Some(join_column.into()),
            ..Self::new(name, AssociationKind::ManyToOne, target)
        }
    }

    /// Create a one-to-many mapping through the target's `mapped_by` column
    pub fn one_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        mapped_by: impl Into<String>,
    ) -> Self {
        Self {
            mapped_by: Some(mapped_by.into()),
            ..Self::new(name, AssociationKind::OneToMany, target)
        }
    }

    /// Create a many-to-many mapping through a link table
    pub fn many_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        join_table: JoinTable,
    ) -> Self {
        Self { join_table: Some(join_table), ..Self::new(name, AssociationKind::ManyToMany, target) }
    }

    /// Check that the storage details required by `kind` are present
    pub fn validate(&self, entity: &str) -> Result<()> {
        let missing = match self.kind {
            AssociationKind::ManyToOne | AssociationKind::OneToOne => {
                self.join_column.is_none().then_some("join_column")
            }
            AssociationKind::OneToMany => self.mapped_by.is_none().then_some("mapped_by"),
            AssociationKind::ManyToMany => self.join_table.is_none().then_some("join_table"),
        };

        match missing {
            Some(key) => Err(TabulumError::config_error(format!(
                "Association '{}' of entity '{entity}' is {} and requires '{key}'",
                self.name, self.kind
            ))),
            None => Ok(()),
        }
    }
}

/// One hydrated entity instance
///
/// Column values keep the order the source returned them in. Associations are
/// only present when the page was fetched with associations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: Vec<(String, Value)>,
    associations: Vec<(String, AssociationValue<Record>)>,
    label: Option<String>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Record::set`]
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Builder-style [`Record::set_association`]
    #[must_use]
    pub fn with_association(
        mut self,
        name: impl Into<String>,
        related: AssociationValue<Record>,
    ) -> Self {
        self.set_association(name, related);
        self
    }

    /// Builder-style [`Record::set_label`]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set a column value, replacing any previous value for that column
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.values.iter_mut().find(|(column, _)| *column == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn set_association(&mut self, name: impl Into<String>, related: AssociationValue<Record>) {
        let name = name.into();
        match self.associations.iter_mut().find(|(assoc, _)| *assoc == name) {
            Some(slot) => slot.1 = related,
            None => self.associations.push((name, related)),
        }
    }

    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(column, _)| column == name).map(|(_, value)| value)
    }

    #[must_use]
    pub fn association(&self, name: &str) -> Option<&AssociationValue<Record>> {
        self.associations.iter().find(|(assoc, _)| assoc == name).map(|(_, related)| related)
    }

    /// Column values in source order
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(column, value)| (column.as_str(), value))
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl TextRepresentation for Record {
    fn to_text(&self) -> Option<String> {
        self.label.clone()
    }
}

/// Render a display template such as `"{name} <{email}>"` against a record
///
/// Unknown columns and NULLs render as empty text. `{{` and `}}` escape braces.
#[must_use]
pub fn render_label(template: &str, record: &Record) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut column = String::new();
                for ch in chars.by_ref() {
                    if ch == '}' {
                        break;
                    }
                    column.push(ch);
                }
                if let Some(value) = record.get(column.trim()) {
                    out.push_str(&value.to_string());
                }
            }
            _ => out.push(ch),
        }
    }

    out
}

/// Metadata of one registered entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    /// Entity identifier (e.g. `App\Entity\User`)
    pub name: String,

    /// Backing table
    pub table: String,

    /// Primary key column
    pub primary_key: String,

    fields: Vec<String>,
    association_names: Vec<String>,
    associations: Vec<AssociationMapping>,

    /// Fields holding date/time values
    pub date_fields: Vec<String>,

    /// Display template used when this entity appears as a related record
    pub display: Option<String>,

    /// Fields overridden by translations when a non-default locale is active
    pub translatable: Vec<String>,
}

impl EntityDescriptor {
    /// Create a descriptor backed by a table of the same name with primary key `id`
    pub fn new(
        name: impl Into<String>,
        fields: Vec<String>,
        associations: Vec<AssociationMapping>,
    ) -> Self {
        let name = name.into();
        let association_names = associations.iter().map(|a| a.name.clone()).collect();
        Self {
            table: name.clone(),
            name,
            primary_key: "id".to_string(),
            fields,
            association_names,
            associations,
            date_fields: Vec::new(),
            display: None,
            translatable: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    #[must_use]
    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    #[must_use]
    pub fn with_date_fields(mut self, date_fields: Vec<String>) -> Self {
        self.date_fields = date_fields;
        self
    }

    #[must_use]
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    #[must_use]
    pub fn with_translatable(mut self, translatable: Vec<String>) -> Self {
        self.translatable = translatable;
        self
    }

    /// Association storage mappings, in declaration order
    #[must_use]
    pub fn associations(&self) -> &[AssociationMapping] {
        &self.associations
    }

    #[must_use]
    pub fn is_date_field(&self, name: &str) -> bool {
        self.date_fields.iter().any(|field| field == name)
    }

    /// Label a record of this entity using its display template
    #[must_use]
    pub fn label_for(&self, record: &Record) -> Option<String> {
        self.display.as_deref().map(|template| render_label(template, record))
    }
}

impl EntityMetadata for EntityDescriptor {
    type Instance = Record;
    type Related = Record;

    fn entity_name(&self) -> &str {
        &self.name
    }

    fn field_names(&self) -> &[String] {
        &self.fields
    }

    fn association_names(&self) -> &[String] {
        &self.association_names
    }

    fn field_value(&self, instance: &Record, name: &str) -> Result<Value> {
        instance.get(name).cloned().ok_or_else(|| {
            TabulumError::metadata_contract(format!(
                "Field '{name}' is not hydrated on an instance of '{}'",
                self.name
            ))
        })
    }

    fn association_value<'a>(
        &self,
        instance: &'a Record,
        name: &str,
    ) -> Result<AssociationValue<&'a Record>> {
        instance.association(name).map(AssociationValue::as_ref).ok_or_else(|| {
            TabulumError::metadata_contract(format!(
                "Association '{name}' is not hydrated on an instance of '{}'",
                self.name
            ))
        })
    }
}

/// One page of instances to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Entity identifier
    pub entity: String,

    /// Maximum number of instances
    pub limit: usize,

    /// Number of instances to skip
    pub offset: usize,

    /// Hydrate associations (skipped when associations are ignored)
    pub with_associations: bool,
}

/// Translation context of a source
///
/// Sources that support translated fields apply the active locale on every
/// fetch after it is set.
pub trait Translatable {
    /// Locale whose values are stored in the entity tables themselves
    fn set_default_locale(&mut self, locale: &str);

    /// Locale to read translated fields in
    fn set_translatable_locale(&mut self, locale: &str);
}

/// Entity source trait
///
/// Every method is a read-only operation. Fetch and metadata errors are fatal
/// to the run; only the two validation queries drive user-facing failures.
pub trait EntitySource {
    /// Metadata accessor produced for registered entities
    type Metadata: EntityMetadata;

    /// Engine name reported in JSON envelopes
    fn engine_name(&self) -> &'static str;

    /// Whether `name` resolves to any known type
    fn type_exists(&self, name: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Whether `name` is a registered, describable entity
    fn is_entity(&self, name: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Describe a registered entity
    fn metadata(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Self::Metadata>> + Send;

    /// Fetch up to `request.limit` instances starting at `request.offset`
    ///
    /// Instances come back in a stable order (primary key order for tables).
    fn fetch(
        &self,
        request: &PageRequest,
    ) -> impl std::future::Future<
        Output = Result<Vec<<Self::Metadata as EntityMetadata>::Instance>>,
    > + Send;
}
