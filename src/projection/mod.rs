//! Row Projection
//!
//! Turns one entity instance into one row of printable cells.
//!
//! For every name in the field list, in order:
//! 1. a known field yields its value (date/time values are formatted with the
//!    configured pattern, everything else passes through unchanged);
//! 2. a known association (unless associations are ignored) is resolved to
//!    text, truncating collections to the configured limit;
//! 3. anything else yields the `N/A` sentinel.
//!
//! The row always has exactly one cell per field-list entry. Projection reads
//! the instance only and never performs I/O.

use std::fmt::{self, Write as _};

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Result, TabulumError};
use crate::metadata::{
    AssociationValue, EntityMetadata, TextRepresentation, Value, DEFAULT_DATE_FORMAT,
};

/// Fallback cell for absent, ignored or unresolvable values
pub const NOT_AVAILABLE: &str = "N/A";

/// Separator between rendered items of a collection association
pub const ASSOCIATION_SEPARATOR: &str = ", ";

/// Default number of related items rendered per collection association
pub const DEFAULT_ASSOCIATIONS_LIMIT: usize = 10;

/// Projection settings, fixed for a whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Render every association as `N/A` without reading it
    /// Default: true
    pub ignore_associations: bool,

    /// Maximum number of items rendered for a collection association
    pub associations_limit: usize,

    /// `strftime` pattern for date/time field values
    pub date_format: String,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            ignore_associations: true,
            associations_limit: DEFAULT_ASSOCIATIONS_LIMIT,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl ProjectionConfig {
    /// Check that the date pattern only contains valid `strftime` specifiers
    pub fn validate(&self) -> Result<()> {
        validate_date_format(&self.date_format)
    }
}

/// Reject `strftime` patterns chrono cannot format for a date/time value
///
/// Offset specifiers (`%z`, `%Z`, `%:z`) parse fine but need a time zone, so
/// the pattern is also rendered once against a fixed value.
pub fn validate_date_format(pattern: &str) -> Result<()> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(TabulumError::invalid_input(format!("Invalid date format '{pattern}'")));
    }
    format_date(&NaiveDateTime::default(), pattern).map(|_| ())
}

/// One printable cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// A field value passed through unchanged
    Value(Value),
    /// Text produced by the projector (formatted dates, associations, `N/A`)
    Text(String),
}

impl Cell {
    /// The `N/A` sentinel cell
    #[must_use]
    pub fn not_available() -> Self {
        Self::Text(NOT_AVAILABLE.to_string())
    }

    #[must_use]
    pub fn is_not_available(&self) -> bool {
        matches!(self, Self::Text(text) if text == NOT_AVAILABLE)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => fmt::Display::fmt(value, f),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => value.serialize(serializer),
            Self::Text(text) => serializer.serialize_str(text),
        }
    }
}

/// Cells of one instance, aligned with the field list
pub type Row = Vec<Cell>;

/// Project one instance into a row
pub fn project_row<M: EntityMetadata>(
    metadata: &M,
    instance: &M::Instance,
    fields: &[String],
    config: &ProjectionConfig,
) -> Result<Row> {
    let mut row = Vec::with_capacity(fields.len());

    for name in fields {
        let cell = if metadata.has_field(name) {
            match metadata.field_value(instance, name)? {
                Value::DateTime(dt) => Cell::Text(format_date(&dt, &config.date_format)?),
                value => Cell::Value(value),
            }
        } else if !config.ignore_associations && metadata.has_association(name) {
            let related = metadata.association_value(instance, name)?;
            Cell::Text(resolve_association(related, config.associations_limit))
        } else {
            Cell::not_available()
        };
        row.push(cell);
    }

    Ok(row)
}

/// Render a resolved association as a single cell
///
/// Absent associations render as `N/A`; an empty collection renders as an
/// empty string.
pub fn resolve_association<T: TextRepresentation>(
    related: AssociationValue<T>,
    associations_limit: usize,
) -> String {
    match related {
        AssociationValue::Absent => NOT_AVAILABLE.to_string(),
        AssociationValue::Single(item) => render_item(&item),
        AssociationValue::Collection(items) => items
            .iter()
            .take(associations_limit)
            .map(render_item)
            .collect::<Vec<_>>()
            .join(ASSOCIATION_SEPARATOR),
    }
}

fn render_item<T: TextRepresentation>(item: &T) -> String {
    item.to_text().unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn format_date(dt: &NaiveDateTime, pattern: &str) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", dt.format(pattern))
        .map_err(|_| TabulumError::invalid_input(format!("Invalid date format '{pattern}'")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct Tag(Option<&'static str>);

    impl TextRepresentation for Tag {
        fn to_text(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[derive(Default)]
    struct Post {
        values: HashMap<&'static str, Value>,
        relations: HashMap<&'static str, AssociationValue<Tag>>,
    }

    struct PostMetadata {
        fields: Vec<String>,
        associations: Vec<String>,
    }

    impl PostMetadata {
        fn new() -> Self {
            Self {
                fields: vec!["id".into(), "title".into(), "published_at".into()],
                associations: vec!["tags".into(), "category".into()],
            }
        }
    }

    impl EntityMetadata for PostMetadata {
        type Instance = Post;
        type Related = Tag;

        fn entity_name(&self) -> &str {
            "Post"
        }

        fn field_names(&self) -> &[String] {
            &self.fields
        }

        fn association_names(&self) -> &[String] {
            &self.associations
        }

        fn field_value(&self, instance: &Post, name: &str) -> Result<Value> {
            instance
                .values
                .get(name)
                .cloned()
                .ok_or_else(|| TabulumError::metadata_contract(format!("no field {name}")))
        }

        fn association_value<'a>(
            &self,
            instance: &'a Post,
            name: &str,
        ) -> Result<AssociationValue<&'a Tag>> {
            instance
                .relations
                .get(name)
                .map(AssociationValue::as_ref)
                .ok_or_else(|| TabulumError::metadata_contract(format!("no association {name}")))
        }
    }

    fn published() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap().and_hms_opt(18, 4, 5).unwrap()
    }

    fn post(tags: usize) -> Post {
        let mut post = Post::default();
        post.values.insert("id", Value::Integer(7));
        post.values.insert("title", Value::from("Hello"));
        post.values.insert("published_at", Value::DateTime(published()));

        const NAMES: [&str; 15] = [
            "t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8", "t9", "t10", "t11", "t12", "t13",
            "t14", "t15",
        ];
        post.relations.insert(
            "tags",
            AssociationValue::Collection(NAMES.iter().take(tags).map(|n| Tag(Some(*n))).collect()),
        );
        post.relations.insert("category", AssociationValue::Single(Tag(Some("News"))));
        post
    }

    fn texts(row: &Row) -> Vec<String> {
        row.iter().map(ToString::to_string).collect()
    }

    fn showing_associations() -> ProjectionConfig {
        ProjectionConfig { ignore_associations: false, ..ProjectionConfig::default() }
    }

    #[test]
    fn test_default_config() {
        let config = ProjectionConfig::default();
        assert!(config.ignore_associations);
        assert_eq!(config.associations_limit, 10);
        assert_eq!(config.date_format, "%Y-%m-%d %H:%M:%S");
    }

    #[test]
    fn test_row_aligned_with_field_list() {
        let meta = PostMetadata::new();
        let fields = crate::metadata::compute_field_list(&meta);
        let row = project_row(&meta, &post(2), &fields, &ProjectionConfig::default()).unwrap();

        assert_eq!(row.len(), fields.len());
        assert_eq!(texts(&row), vec!["7", "Hello", "2024-01-31 18:04:05", "N/A", "N/A"]);
    }

    #[test]
    fn test_scalars_pass_through() {
        let meta = PostMetadata::new();
        let row = project_row(&meta, &post(0), &["id".to_string()], &ProjectionConfig::default())
            .unwrap();
        assert_eq!(row, vec![Cell::Value(Value::Integer(7))]);
    }

    #[test]
    fn test_associations_rendered_when_not_ignored() {
        let meta = PostMetadata::new();
        let fields = vec!["tags".to_string(), "category".to_string()];
        let row = project_row(&meta, &post(3), &fields, &showing_associations()).unwrap();
        assert_eq!(texts(&row), vec!["t1, t2, t3", "News"]);
    }

    #[test]
    fn test_collection_truncated_to_limit() {
        let meta = PostMetadata::new();
        let row =
            project_row(&meta, &post(15), &["tags".to_string()], &showing_associations()).unwrap();
        assert_eq!(texts(&row), vec!["t1, t2, t3, t4, t5, t6, t7, t8, t9, t10"]);
    }

    #[test]
    fn test_zero_limit_yields_empty_string() {
        let meta = PostMetadata::new();
        let config = ProjectionConfig { associations_limit: 0, ..showing_associations() };
        let row = project_row(&meta, &post(5), &["tags".to_string()], &config).unwrap();
        assert_eq!(row, vec![Cell::Text(String::new())]);
        assert!(!row[0].is_not_available());
    }

    #[test]
    fn test_unknown_name_is_not_available() {
        let meta = PostMetadata::new();
        let row = project_row(&meta, &post(1), &["nope".to_string()], &showing_associations())
            .unwrap();
        assert!(row[0].is_not_available());
    }

    #[test]
    fn test_date_format_changes_only_date_cells() {
        let meta = PostMetadata::new();
        let fields = crate::metadata::compute_field_list(&meta);
        let instance = post(2);

        let default_row =
            texts(&project_row(&meta, &instance, &fields, &showing_associations()).unwrap());
        let config = ProjectionConfig { date_format: "%d/%m/%Y".into(), ..showing_associations() };
        let custom_row = texts(&project_row(&meta, &instance, &fields, &config).unwrap());

        assert_eq!(custom_row[2], "31/01/2024");
        for idx in [0, 1, 3, 4] {
            assert_eq!(default_row[idx], custom_row[idx]);
        }
    }

    #[test]
    fn test_projection_is_idempotent() {
        let meta = PostMetadata::new();
        let fields = crate::metadata::compute_field_list(&meta);
        let instance = post(4);
        let config = showing_associations();

        let first = project_row(&meta, &instance, &fields, &config).unwrap();
        let second = project_row(&meta, &instance, &fields, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_field_value_is_contract_violation() {
        let meta = PostMetadata::new();
        let mut instance = post(0);
        instance.values.remove("title");

        let err = project_row(&meta, &instance, &["title".to_string()], &ProjectionConfig::default())
            .unwrap_err();
        assert!(matches!(err, TabulumError::MetadataContract(_)));
    }

    #[test]
    fn test_resolve_absent() {
        assert_eq!(resolve_association(AssociationValue::<Tag>::Absent, 10), "N/A");
    }

    #[test]
    fn test_resolve_empty_collection() {
        assert_eq!(resolve_association(AssociationValue::<Tag>::Collection(vec![]), 10), "");
    }

    #[test]
    fn test_resolve_item_without_text() {
        let related = AssociationValue::Collection(vec![Tag(Some("a")), Tag(None), Tag(Some("c"))]);
        assert_eq!(resolve_association(related, 10), "a, N/A, c");
        assert_eq!(resolve_association(AssociationValue::Single(Tag(None)), 10), "N/A");
    }

    #[test]
    fn test_validate_date_format() {
        assert!(validate_date_format("%Y-%m-%d %H:%M:%S").is_ok());
        assert!(validate_date_format("%Q").is_err());
        assert!(ProjectionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_offset_specifiers() {
        for pattern in ["%z", "%Y %z", "%:z", "%Z"] {
            let err = validate_date_format(pattern).unwrap_err();
            assert!(matches!(err, TabulumError::InvalidInput(_)), "{pattern}");
        }

        let config = ProjectionConfig { date_format: "%d.%m.%Y %z".into(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cell_serialization() {
        assert_eq!(serde_json::to_value(Cell::not_available()).unwrap(), serde_json::json!("N/A"));
        assert_eq!(
            serde_json::to_value(Cell::Value(Value::Integer(1))).unwrap(),
            serde_json::json!(1)
        );
        assert_eq!(serde_json::to_value(Cell::Value(Value::Null)).unwrap(), serde_json::Value::Null);
    }
}
