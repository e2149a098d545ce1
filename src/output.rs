//! Table Output
//!
//! This module renders a listing [`Table`] for stdout, either as a bordered text
//! table or as a JSON envelope.
//!
//! # JSON Contract
//! - Success: `{"ok": true, "engine": "...", "command": "...", "data": {"header": [...], "rows": [...]}, "meta": {...}}`
//! - Error: `{"ok": false, "engine": "...", "command": "...", "error": {"code": "...", "message": "..."}}`
//!
//! Field values keep their JSON type in `rows`; projected text (formatted
//! dates, associations, `N/A`) is always a string.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabulumError};
use crate::projection::Row;

/// Output of one listing run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    /// Field list: fields followed by associations
    pub header: Vec<String>,

    /// One row per fetched instance, in fetch order
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Row>) -> Self {
        Self { header, rows }
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Turns a table into the text printed on stdout
pub trait TableRenderer {
    fn render(&self, table: &Table) -> Result<String>;
}

/// Bordered plain-text table
///
/// ```text
/// +----+-----------+
/// | id | name      |
/// +----+-----------+
/// | 1  | Test Name |
/// +----+-----------+
/// ```
///
/// Column widths count `char`s, not terminal cells. Wide characters (CJK,
/// most emoji) take two cells each, so rows holding them will not line up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextTableRenderer;

impl TableRenderer for TextTableRenderer {
    fn render(&self, table: &Table) -> Result<String> {
        if table.header.is_empty() {
            return Ok(String::new());
        }

        let rows: Vec<Vec<String>> = table
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| single_line(&cell.to_string())).collect())
            .collect();

        let mut widths: Vec<usize> = table.header.iter().map(|h| h.chars().count()).collect();
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let border = border_line(&widths);
        let mut out = String::new();

        out.push_str(&border);
        out.push_str(&content_line(&table.header, &widths));
        out.push_str(&border);
        for row in &rows {
            out.push_str(&content_line(row, &widths));
        }
        if !rows.is_empty() {
            out.push_str(&border);
        }

        Ok(out)
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

fn border_line(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line.push('\n');
    line
}

fn content_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (idx, width) in widths.iter().enumerate() {
        let cell = cells.get(idx).map_or("", String::as_str);
        let padding = width - cell.chars().count().min(*width);
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(padding + 1));
        line.push('|');
    }
    line.push('\n');
    line
}

/// JSON success envelope around the table
#[derive(Debug, Clone)]
pub struct JsonRenderer {
    engine: String,
    command: String,
    execution_ms: u64,
}

impl JsonRenderer {
    pub fn new(engine: impl Into<String>, command: impl Into<String>, execution_ms: u64) -> Self {
        Self { engine: engine.into(), command: command.into(), execution_ms }
    }
}

impl TableRenderer for JsonRenderer {
    fn render(&self, table: &Table) -> Result<String> {
        let envelope = SuccessEnvelope::new(
            &self.engine,
            &self.command,
            table,
            Metadata::with_rows(self.execution_ms, table.len()),
        );
        serde_json::to_string(&envelope)
            .map_err(|e| TabulumError::invalid_input(format!("Failed to serialize table: {e}")))
    }
}

/// Success envelope for command results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Entity source used for this run (sqlite, memory)
    pub engine: String,

    /// Command that was executed (list, list-translatable)
    pub command: String,

    pub data: T,

    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(
        engine: impl Into<String>,
        command: impl Into<String>,
        data: T,
        meta: Metadata,
    ) -> Self {
        Self { ok: true, engine: engine.into(), command: command.into(), data, meta }
    }
}

/// Error envelope for failed runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    pub engine: String,
    pub command: String,
    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    pub fn new(engine: impl Into<String>, command: impl Into<String>, error: ErrorInfo) -> Self {
        Self { ok: false, engine: engine.into(), command: command.into(), error }
    }

    /// Create error envelope from a [`TabulumError`]
    pub fn from_error(
        engine: impl Into<String>,
        command: impl Into<String>,
        err: &TabulumError,
    ) -> Self {
        Self::new(engine, command, ErrorInfo::new(err.error_code(), err.message()))
    }
}

/// Error information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g., "ENTITY_NOT_FOUND", "QUERY_FAILED")
    pub code: String,

    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

/// Execution metadata included in success responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub execution_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_returned: Option<usize>,
}

impl Metadata {
    pub fn new(execution_ms: u64) -> Self {
        Self { execution_ms, rows_returned: None }
    }

    pub fn with_rows(execution_ms: u64, rows_returned: usize) -> Self {
        Self { execution_ms, rows_returned: Some(rows_returned) }
    }
}
