//! Entity Metadata Contracts
//!
//! This module defines how the row projector sees an entity type and its instances.
//! Nothing here knows about SQL: every data source hands the projector an
//! [`EntityMetadata`] implementation and a page of instances.
//!
//! # Contracts
//! - [`EntityMetadata`] lists field and association names (in declaration order)
//!   and reads values off an instance by name.
//! - [`TextRepresentation`] is the "render as text" capability used for related
//!   instances. Instances without one fall back to the `N/A` sentinel.
//! - [`AssociationValue`] is resolved by the data source at hydration time, so the
//!   projector never inspects runtime types.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::error::Result;

/// Default `strftime` pattern for date/time cells (`2006-01-02 15:04:05` style)
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A scalar value read from an entity field
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL / missing scalar
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    /// Raw bytes, printed as Base64
    Blob(Vec<u8>),
    /// A date/time value; the only kind of value the projector reformats
    DateTime(NaiveDateTime),
}

impl Value {
    /// Whether this value is NULL
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
            Self::Blob(b) => {
                use base64::Engine;
                f.write_str(&base64::engine::general_purpose::STANDARD.encode(b))
            }
            Self::DateTime(dt) => write!(f, "{}", dt.format(DEFAULT_DATE_FORMAT)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            // NaN/Infinity are not representable in JSON
            Self::Real(r) if r.is_finite() => serializer.serialize_f64(*r),
            Self::Real(_) => serializer.serialize_none(),
            Self::Text(_) | Self::Blob(_) | Self::DateTime(_) => {
                serializer.collect_str(self)
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

/// The resolved value of an association on one instance
#[derive(Debug, Clone, PartialEq)]
pub enum AssociationValue<I> {
    /// No related instance (null foreign key, dangling reference)
    Absent,
    /// A to-one association
    Single(I),
    /// A to-many association, in storage order
    Collection(Vec<I>),
}

impl<I> AssociationValue<I> {
    /// Borrow the related instances
    pub fn as_ref(&self) -> AssociationValue<&I> {
        match self {
            Self::Absent => AssociationValue::Absent,
            Self::Single(item) => AssociationValue::Single(item),
            Self::Collection(items) => AssociationValue::Collection(items.iter().collect()),
        }
    }

    /// Number of related instances
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Absent => 0,
            Self::Single(_) => 1,
            Self::Collection(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// "Render as text" capability for related instances
///
/// Returning `None` means the instance has no textual representation; the
/// projector then prints the `N/A` sentinel in its place.
pub trait TextRepresentation {
    fn to_text(&self) -> Option<String>;
}

impl TextRepresentation for String {
    fn to_text(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl<T: TextRepresentation + ?Sized> TextRepresentation for &T {
    fn to_text(&self) -> Option<String> {
        (**self).to_text()
    }
}

/// Metadata accessor for one entity type
///
/// Field and association names are unique and disjoint. Both lists keep the
/// order the entity declares them in.
pub trait EntityMetadata {
    /// Instance type produced by the data source
    type Instance;

    /// Instance type reachable through associations
    type Related: TextRepresentation;

    /// Name of the described entity type
    fn entity_name(&self) -> &str;

    /// Scalar field names, in declaration order
    fn field_names(&self) -> &[String];

    /// Association names, in declaration order
    fn association_names(&self) -> &[String];

    fn has_field(&self, name: &str) -> bool {
        self.field_names().iter().any(|field| field == name)
    }

    fn has_association(&self, name: &str) -> bool {
        self.association_names().iter().any(|assoc| assoc == name)
    }

    /// Read a scalar field off an instance
    ///
    /// Fails with a metadata contract error when the instance cannot supply a
    /// declared field.
    fn field_value(&self, instance: &Self::Instance, name: &str) -> Result<Value>;

    /// Read a hydrated association off an instance
    fn association_value<'a>(
        &self,
        instance: &'a Self::Instance,
        name: &str,
    ) -> Result<AssociationValue<&'a Self::Related>>;
}

/// Compose the table header: fields followed by associations
///
/// No deduplication is performed; the result is also the projection order.
pub fn compute_field_list<M: EntityMetadata + ?Sized>(metadata: &M) -> Vec<String> {
    metadata.field_names().iter().chain(metadata.association_names()).cloned().collect()
}
