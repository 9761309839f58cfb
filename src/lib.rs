//! # Linkstore - relational consistency layer for SQLite
//!
//! SQLite only gives us scalar columns, transactions and raw statements.
//! Linkstore layers derived relational semantics on top:
//! - Bidirectional link fields backed by `lk_<owner>_<target>` relation tables
//! - Denormalized `<column>__title` caches kept in sync on every mutation
//! - Deterministic sort/paginate rewriting of arbitrary SELECT statements
//! - Idempotent, best-effort secondary index creation

pub mod naming;
pub mod field;
pub mod storage;
pub mod query;
pub mod index;
pub mod link;
pub mod table;
pub mod config;
pub mod output;
pub mod ui;

// Re-exports for convenient access
pub use field::{Field, FieldType, LinkProperty};
pub use index::{IndexHooks, IndexOutcome};
pub use link::{LinkDiff, LinkFieldService};
pub use query::{OrderSpec, SortDirection};
pub use storage::SqliteStore;
pub use table::TableManager;

/// Result type alias for Linkstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Linkstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error in `{sql}`: {message}")]
    Parse { sql: String, message: String },

    #[error("Failed to provision link field {field}: {source}")]
    SchemaProvision {
        field: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to update {table}.{column} for row {row_id}: {source}")]
    Mutation {
        table: String,
        column: String,
        row_id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to create index {index}: {source}")]
    Index {
        index: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Field not found: {table}.{column}")]
    FieldNotFound { table: String, column: String },

    #[error("Unknown field type: {0}")]
    UnknownFieldType(String),

    #[error("Not a link field: {0}")]
    NotALinkField(String),

    #[error("Link field {0} needs a target table")]
    MissingLinkTarget(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Invalid field property: {0}")]
    Property(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
