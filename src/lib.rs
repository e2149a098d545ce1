//! Tabulum - Metadata-Driven Entity Inspector
//!
//! Tabulum pages through the stored instances of an entity type and prints them
//! as a table. What a row contains is driven entirely by the entity's metadata:
//! the header is its fields followed by its associations, and each instance is
//! projected cell by cell against that header.
//!
//! # Core Principles
//! - Read-only: sources never write
//! - Metadata-driven: no per-entity code, only a registry of entity definitions
//! - Deterministic: identical inputs produce identical tables
//! - Projection is pure: no I/O happens while turning instances into rows
//!
//! # Module Organization
//! - [`error`] - Error types and exit codes
//! - [`metadata`] - Metadata contracts and values
//! - [`projection`] - Row projection and association rendering
//! - [`engine`] - Entity source trait, `SQLite` and in-memory sources
//! - [`config`] - Layered configuration and the entity registry
//! - [`command`] - The list command and its pre-fetch hooks
//! - [`output`] - Text/JSON table renderers and envelopes

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod output;
pub mod projection;

pub use command::{ListCommand, ListOptions, LocaleHook, PrefetchHook};
pub use config::{EntityDefinition, ListDefaults, TabulumConfig};
pub use engine::memory::MemorySource;
pub use engine::sqlite::SqliteSource;
pub use engine::{
    AssociationKind, AssociationMapping, EntityDescriptor, EntitySource, JoinTable, PageRequest,
    Record, Translatable,
};
pub use error::{Result, TabulumError};
pub use metadata::{
    compute_field_list, AssociationValue, EntityMetadata, TextRepresentation, Value,
};
pub use output::{
    ErrorEnvelope, ErrorInfo, JsonRenderer, Metadata, SuccessEnvelope, Table, TableRenderer,
    TextTableRenderer,
};
pub use projection::{project_row, resolve_association, Cell, ProjectionConfig, Row};
