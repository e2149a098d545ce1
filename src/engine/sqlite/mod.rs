//! `SQLite` Entity Source
//!
//! This module implements [`EntitySource`] over a `SQLite` database file and the
//! entity registry from the configuration.
//!
//! # Features
//! - Known types: registered entities plus every table/view in `sqlite_master`
//! - Field lists from the registry, or from `PRAGMA table_info` when omitted
//! - Paged fetches in primary key order
//! - Association hydration (to-one, one-to-many, many-to-many through a link table)
//! - Translated fields read from a translation table for a non-default locale
//!
//! # Implementation Notes
//! - Uses `rusqlite` (synchronous driver, no async needed)
//! - Connections are opened read-only per operation and closed on return
//! - Date fields stored as text or unix seconds are parsed into date/time values
//! - BLOB data is kept as bytes and printed Base64-encoded

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, ValueRef};
use rusqlite::{params, Connection, OpenFlags, Row};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::{EntityDefinition, TabulumConfig, TranslationSettings};
use crate::engine::{
    AssociationKind, AssociationMapping, EntityDescriptor, EntitySource, PageRequest, Record,
    Translatable,
};
use crate::error::{Result, TabulumError};
use crate::metadata::{AssociationValue, Value};

/// Text layouts accepted for date fields, tried in order before RFC 3339
const DATE_TIME_FORMATS: [&str; 4] =
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// `SQLite` entity source
#[derive(Debug, Clone)]
pub struct SqliteSource {
    file: PathBuf,
    entities: BTreeMap<String, EntityDefinition>,
    translations: TranslationSettings,
    locale: Option<String>,
}

impl SqliteSource {
    /// Create a source over `file` with the given entity registry
    pub fn new(
        file: impl Into<PathBuf>,
        entities: BTreeMap<String, EntityDefinition>,
        translations: TranslationSettings,
    ) -> Self {
        Self { file: file.into(), entities, translations, locale: None }
    }

    /// Create a source from a loaded configuration
    pub fn from_config(config: &TabulumConfig) -> Result<Self> {
        let file = config.database.clone().ok_or_else(|| {
            TabulumError::config_error(
                "No database configured. Set 'database' in the config file or pass --database.",
            )
        })?;

        Ok(Self::new(file, config.entities.clone(), config.translation_settings()))
    }

    /// Locale translations are currently read in, if it differs from the default
    #[must_use]
    pub fn active_locale(&self) -> Option<&str> {
        self.locale.as_deref().filter(|locale| *locale != self.translations.default_locale)
    }

    fn open(&self) -> Result<Connection> {
        let path = self.file.to_str().ok_or_else(|| {
            TabulumError::invalid_input("SQLite file path contains invalid UTF-8 characters")
        })?;
        open_connection(path)
    }

    fn definition(&self, name: &str) -> Result<&EntityDefinition> {
        self.entities.get(name).ok_or_else(|| TabulumError::not_an_entity(name))
    }

    /// Build the descriptor of a registered entity from its definition and table
    fn describe(&self, conn: &Connection, name: &str) -> Result<EntityDescriptor> {
        let definition = self.definition(name)?;
        let columns = table_columns(conn, &definition.table)?;

        if columns.is_empty() {
            return Err(TabulumError::query_failed(format!(
                "Table '{}' of entity '{name}' does not exist",
                definition.table
            )));
        }

        for mapping in &definition.associations {
            mapping.validate(name)?;
        }

        let primary_key = definition
            .primary_key
            .clone()
            .or_else(|| columns.iter().find(|c| c.pk > 0).map(|c| c.name.clone()))
            .unwrap_or_else(|| "id".to_string());

        let join_columns: Vec<&str> = definition
            .associations
            .iter()
            .filter(|mapping| mapping.kind.is_to_one())
            .filter_map(|mapping| mapping.join_column.as_deref())
            .collect();

        let fields = definition.fields.clone().unwrap_or_else(|| {
            columns
                .iter()
                .filter(|c| !join_columns.contains(&c.name.as_str()))
                .map(|c| c.name.clone())
                .collect()
        });

        let mut date_fields = definition.date_fields.clone();
        for column in columns.iter().filter(|c| is_date_type(&c.decl_type)) {
            if !date_fields.contains(&column.name) {
                date_fields.push(column.name.clone());
            }
        }

        let mut descriptor = EntityDescriptor::new(name, fields, definition.associations.clone())
            .with_table(definition.table.clone())
            .with_primary_key(primary_key)
            .with_date_fields(date_fields)
            .with_translatable(definition.translatable.clone());
        if let Some(display) = &definition.display {
            descriptor = descriptor.with_display(display.clone());
        }

        Ok(descriptor)
    }

    /// Run a `SELECT` returning rows of `descriptor`'s table and turn them into records
    fn load_records(
        &self,
        conn: &Connection,
        descriptor: &EntityDescriptor,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<Record>> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| TabulumError::query_failed(format!("Failed to prepare query: {e}")))?;

        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| (*s).to_string()).collect();

        let mut rows = stmt
            .query(params)
            .map_err(|e| TabulumError::query_failed(format!("Failed to execute query: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) =
            rows.next().map_err(|e| TabulumError::query_failed(format!("Failed to fetch row: {e}")))?
        {
            records.push(row_to_record(descriptor, &column_names, row)?);
        }

        self.translate(conn, descriptor, &mut records)?;

        for record in &mut records {
            let label = descriptor.label_for(record);
            record.set_label(label);
        }

        Ok(records)
    }

    /// Override translatable fields with their translation in the active locale
    fn translate(
        &self,
        conn: &Connection,
        descriptor: &EntityDescriptor,
        records: &mut [Record],
    ) -> Result<()> {
        let Some(locale) = self.active_locale() else {
            return Ok(());
        };
        if descriptor.translatable.is_empty() || records.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "SELECT field, content FROM {} WHERE locale = ?1 AND object_class = ?2 AND foreign_key = ?3",
            quote_ident(&self.translations.table)
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| {
            TabulumError::query_failed(format!(
                "Failed to query translation table '{}': {e}",
                self.translations.table
            ))
        })?;

        for record in records.iter_mut() {
            let Some(id) = record.get(&descriptor.primary_key).filter(|v| !v.is_null()) else {
                continue;
            };
            let id = id.to_string();

            let translations = stmt
                .query_map(params![locale, descriptor.name, id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
                })
                .map_err(|e| {
                    TabulumError::query_failed(format!("Failed to query translations: {e}"))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| {
                    TabulumError::query_failed(format!("Failed to collect translations: {e}"))
                })?;

            for (field, content) in translations {
                let Some(content) = content else { continue };
                if !descriptor.translatable.contains(&field) {
                    continue;
                }
                let value = if descriptor.is_date_field(&field) {
                    parse_date_time(&content).map_or(Value::Text(content), Value::DateTime)
                } else {
                    Value::Text(content)
                };
                record.set(field, value);
            }
        }

        Ok(())
    }

    /// Resolve every association of `descriptor` on each record
    fn hydrate(
        &self,
        conn: &Connection,
        descriptor: &EntityDescriptor,
        records: &mut [Record],
    ) -> Result<()> {
        for mapping in descriptor.associations() {
            let target = self.describe(conn, &mapping.target)?;
            for record in records.iter_mut() {
                let related = self.related(conn, descriptor, &target, mapping, record)?;
                record.set_association(mapping.name.clone(), related);
            }
        }
        Ok(())
    }

    fn related(
        &self,
        conn: &Connection,
        owner: &EntityDescriptor,
        target: &EntityDescriptor,
        mapping: &AssociationMapping,
        record: &Record,
    ) -> Result<AssociationValue<Record>> {
        let table = quote_ident(&target.table);
        let target_pk = quote_ident(&target.primary_key);

        match mapping.kind {
            AssociationKind::ManyToOne | AssociationKind::OneToOne => {
                let column = required(mapping.join_column.as_deref(), mapping, owner)?;
                let Some(key) = key_param(record, column, owner)? else {
                    return Ok(AssociationValue::Absent);
                };

                let sql = format!("SELECT * FROM {table} WHERE {target_pk} = ?1 LIMIT 1");
                let mut found = self.load_records(conn, target, &sql, &[&key])?;
                Ok(found.pop().map_or(AssociationValue::Absent, AssociationValue::Single))
            }
            AssociationKind::OneToMany => {
                let mapped_by = required(mapping.mapped_by.as_deref(), mapping, owner)?;
                let Some(key) = key_param(record, &owner.primary_key, owner)? else {
                    return Ok(AssociationValue::Collection(Vec::new()));
                };

                let sql = format!(
                    "SELECT * FROM {table} WHERE {} = ?1 ORDER BY {target_pk}",
                    quote_ident(mapped_by)
                );
                Ok(AssociationValue::Collection(self.load_records(conn, target, &sql, &[&key])?))
            }
            AssociationKind::ManyToMany => {
                let join_table = mapping.join_table.as_ref().ok_or_else(|| {
                    TabulumError::config_error(format!(
                        "Association '{}' of entity '{}' requires 'join_table'",
                        mapping.name, owner.name
                    ))
                })?;
                let Some(key) = key_param(record, &owner.primary_key, owner)? else {
                    return Ok(AssociationValue::Collection(Vec::new()));
                };

                let sql = format!(
                    "SELECT t.* FROM {table} t JOIN {} j ON j.{} = t.{target_pk} \
                     WHERE j.{} = ?1 ORDER BY t.{target_pk}",
                    quote_ident(&join_table.name),
                    quote_ident(&join_table.inverse_join_column),
                    quote_ident(&join_table.join_column),
                );
                Ok(AssociationValue::Collection(self.load_records(conn, target, &sql, &[&key])?))
            }
        }
    }
}

impl Translatable for SqliteSource {
    fn set_default_locale(&mut self, locale: &str) {
        self.translations.default_locale = locale.to_string();
    }

    fn set_translatable_locale(&mut self, locale: &str) {
        self.locale = Some(locale.to_string());
    }
}

impl EntitySource for SqliteSource {
    type Metadata = EntityDescriptor;

    fn engine_name(&self) -> &'static str {
        "sqlite"
    }

    async fn type_exists(&self, name: &str) -> Result<bool> {
        if self.entities.contains_key(name) {
            return Ok(true);
        }

        let conn = self.open()?;
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1)",
            [name],
            |row| row.get::<_, bool>(0),
        )
        .map_err(|e| TabulumError::query_failed(format!("Failed to look up type '{name}': {e}")))
    }

    async fn is_entity(&self, name: &str) -> Result<bool> {
        Ok(self.entities.contains_key(name))
    }

    async fn metadata(&self, name: &str) -> Result<EntityDescriptor> {
        let conn = self.open()?;
        self.describe(&conn, name)
    }

    async fn fetch(&self, request: &PageRequest) -> Result<Vec<Record>> {
        let conn = self.open()?;
        let descriptor = self.describe(&conn, &request.entity)?;

        tracing::debug!(
            entity = %request.entity,
            table = %descriptor.table,
            limit = request.limit,
            offset = request.offset,
            locale = self.active_locale(),
            "fetching page"
        );

        let sql = format!(
            "SELECT * FROM {} ORDER BY {} LIMIT ?1 OFFSET ?2",
            quote_ident(&descriptor.table),
            quote_ident(&descriptor.primary_key)
        );
        let limit = i64::try_from(request.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(request.offset).unwrap_or(i64::MAX);

        let mut records = self.load_records(&conn, &descriptor, &sql, &[&limit, &offset])?;

        if request.with_associations {
            self.hydrate(&conn, &descriptor, &mut records)?;
        }

        Ok(records)
    }
}

/// Open a read-only `SQLite` connection
fn open_connection(path: &str) -> Result<Connection> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(|e| {
        TabulumError::connection_failed(format!("Failed to open SQLite database: {e}"))
    })
}

/// Quote an identifier for interpolation into SQL
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

struct ColumnDecl {
    name: String,
    decl_type: String,
    pk: i32,
}

/// Column declarations via `PRAGMA table_info` (empty when the table does not exist)
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnDecl>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table))).map_err(
        |e| TabulumError::query_failed(format!("Failed to prepare table_info for {table}: {e}")),
    )?;

    let columns: Vec<ColumnDecl> = stmt
        .query_map([], |row| {
            Ok(ColumnDecl {
                name: row.get::<_, String>(1)?,
                decl_type: row.get::<_, String>(2)?,
                pk: row.get::<_, i32>(5)?, // >0 means part of primary key
            })
        })
        .map_err(|e| {
            TabulumError::query_failed(format!("Failed to query columns for {table}: {e}"))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            TabulumError::query_failed(format!("Failed to collect columns for {table}: {e}"))
        })?;

    Ok(columns)
}

fn is_date_type(decl_type: &str) -> bool {
    let decl_type = decl_type.to_ascii_uppercase();
    decl_type.contains("DATE") || decl_type.contains("TIME")
}

fn required<'m>(
    value: Option<&'m str>,
    mapping: &AssociationMapping,
    owner: &EntityDescriptor,
) -> Result<&'m str> {
    value.ok_or_else(|| {
        TabulumError::config_error(format!(
            "Association '{}' of entity '{}' is missing its join column",
            mapping.name, owner.name
        ))
    })
}

/// Key value of `column` on `record` as a query parameter; `None` for NULL
fn key_param(
    record: &Record,
    column: &str,
    owner: &EntityDescriptor,
) -> Result<Option<rusqlite::types::Value>> {
    let value = record.get(column).ok_or_else(|| {
        TabulumError::metadata_contract(format!(
            "Column '{column}' is missing from '{}' records",
            owner.name
        ))
    })?;

    Ok(match value {
        Value::Null => None,
        Value::Bool(b) => Some(rusqlite::types::Value::Integer(i64::from(*b))),
        Value::Integer(i) => Some(rusqlite::types::Value::Integer(*i)),
        Value::Real(f) => Some(rusqlite::types::Value::Real(*f)),
        Value::Blob(b) => Some(rusqlite::types::Value::Blob(b.clone())),
        Value::Text(_) | Value::DateTime(_) => Some(rusqlite::types::Value::Text(value.to_string())),
    })
}

/// Convert a `SQLite` row into a record
fn row_to_record(
    descriptor: &EntityDescriptor,
    column_names: &[String],
    row: &Row,
) -> Result<Record> {
    let mut record = Record::new();
    for (idx, column) in column_names.iter().enumerate() {
        let value = sqlite_value(row, idx, descriptor.is_date_field(column)).map_err(|e| {
            TabulumError::query_failed(format!("Failed to read column '{column}': {e}"))
        })?;
        record.set(column.clone(), value);
    }
    Ok(record)
}

/// Convert a `SQLite` value, parsing date fields into date/time values
fn sqlite_value(
    row: &Row,
    idx: usize,
    is_date: bool,
) -> std::result::Result<Value, rusqlite::Error> {
    let value_ref = row.get_ref(idx)?;

    Ok(match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if is_date => DateTime::from_timestamp(i, 0)
            .map_or(Value::Integer(i), |dt| Value::DateTime(dt.naive_utc())),
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(s) => {
            let text = std::str::from_utf8(s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            match is_date.then(|| parse_date_time(text)).flatten() {
                Some(dt) => Value::DateTime(dt),
                None => Value::Text(text.to_string()),
            }
        }
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}

/// Parse the textual date layouts `SQLite` applications commonly store
fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
