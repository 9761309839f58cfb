//! Database schema definitions

use crate::naming::{self, ID_COLUMN, TITLE_COLUMN};
use crate::Result;

/// SQL to create the field metadata table
pub const CREATE_FIELDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS _fields (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    table_name TEXT NOT NULL,
    table_column_name TEXT NOT NULL,
    property TEXT,
    UNIQUE(table_name, table_column_name)
)
"#;

/// SQL to create the table registry (raw table name -> display name)
pub const CREATE_TABLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS _tables (
    name TEXT PRIMARY KEY,
    display_name TEXT NOT NULL
)
"#;

/// SQL to create metadata indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_fields_table ON _fields(table_name)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_FIELDS_TABLE, CREATE_TABLES_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

/// DDL for a user data table: stable identifier plus a title column.
pub fn create_data_table(table: &str) -> Result<String> {
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({} TEXT PRIMARY KEY, {} TEXT)",
        naming::validate_identifier(table)?,
        ID_COLUMN,
        TITLE_COLUMN
    ))
}

/// DDL for one directed side of a link relationship.
pub fn create_relation_table(relation_table: &str) -> Result<String> {
    Ok(format!(
        r#"CREATE TABLE IF NOT EXISTS {} (
    self TEXT,
    ref TEXT,
    link_field_id TEXT,
    PRIMARY KEY (self, ref, link_field_id)
)"#,
        naming::validate_identifier(relation_table)?
    ))
}

/// DDL adding a nullable text column.
pub fn add_text_column(table: &str, column: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {} TEXT",
        naming::validate_identifier(table)?,
        naming::validate_identifier(column)?
    ))
}

/// DDL dropping a column.
pub fn drop_column(table: &str, column: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} DROP COLUMN {}",
        naming::validate_identifier(table)?,
        naming::validate_identifier(column)?
    ))
}
