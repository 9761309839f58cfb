//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - _fields(id, name, type, table_name, table_column_name, property)
//! - _tables(name, display_name)
//! - one data table per user table: (_id, title, <field columns>...)
//! - lk_<owner>_<target>(self, ref, link_field_id) per link direction

pub mod schema;
pub mod sqlite;
pub mod metadata;

pub use sqlite::{SqliteStore, Record, DbStats, query_records};
