//! Field descriptor and table registry persistence
//!
//! These helpers take the connection explicitly so they run unchanged inside
//! a transaction scope handed out by `SqliteStore::transaction`.

use rusqlite::{params, Connection, OptionalExtension};
use crate::field::{Field, FieldType};
use crate::{Error, Result};

const FIELD_COLUMNS: &str = "id, name, type, table_name, table_column_name, property";

/// Insert a field descriptor, returning its metadata id
pub fn insert_field(conn: &Connection, field: &Field) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO _fields (name, type, table_name, table_column_name, property)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            field.name,
            field.field_type.as_str(),
            field.table_name,
            field.table_column_name,
            field.property_json()?,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get a field by owning table and physical column
pub fn get_field(conn: &Connection, table: &str, column: &str) -> Result<Option<Field>> {
    let sql = format!(
        "SELECT {} FROM _fields WHERE table_name = ?1 AND table_column_name = ?2",
        FIELD_COLUMNS
    );
    let raw = conn
        .query_row(&sql, params![table, column], row_to_raw_field)
        .optional()?;
    raw.map(RawField::into_field).transpose()
}

/// Get a field, failing with `FieldNotFound` when absent
pub fn require_field(conn: &Connection, table: &str, column: &str) -> Result<Field> {
    get_field(conn, table, column)?.ok_or_else(|| Error::FieldNotFound {
        table: table.to_string(),
        column: column.to_string(),
    })
}

/// All fields of a table, in creation order
pub fn list_fields(conn: &Connection, table: &str) -> Result<Vec<Field>> {
    let sql = format!("SELECT {} FROM _fields WHERE table_name = ?1 ORDER BY id", FIELD_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let raws = stmt
        .query_map([table], row_to_raw_field)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawField::into_field).collect()
}

/// Link fields on any table whose property points at `target_table`
pub fn link_fields_targeting(conn: &Connection, target_table: &str) -> Result<Vec<Field>> {
    let sql = format!("SELECT {} FROM _fields WHERE type = 'link' ORDER BY id", FIELD_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let raws = stmt
        .query_map([], row_to_raw_field)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut fields = Vec::new();
    for raw in raws {
        let field = raw.into_field()?;
        if field.link_property()?.link_table_name == target_table {
            fields.push(field);
        }
    }
    Ok(fields)
}

/// Change a field's display name
pub fn rename_field(conn: &Connection, table: &str, column: &str, name: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE _fields SET name = ?1 WHERE table_name = ?2 AND table_column_name = ?3",
        params![name, table, column],
    )?;
    if changed == 0 {
        return Err(Error::FieldNotFound {
            table: table.to_string(),
            column: column.to_string(),
        });
    }
    Ok(())
}

/// Remove a field descriptor
pub fn delete_field(conn: &Connection, table: &str, column: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM _fields WHERE table_name = ?1 AND table_column_name = ?2",
        params![table, column],
    )?;
    Ok(())
}

/// Record a data table and its display name
pub fn register_table(conn: &Connection, table: &str, display_name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO _tables (name, display_name) VALUES (?1, ?2)",
        params![table, display_name],
    )?;
    Ok(())
}

/// Display name of a registered table
pub fn table_display_name(conn: &Connection, table: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT display_name FROM _tables WHERE name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?)
}

/// All registered tables as (name, display name)
pub fn list_tables(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT name, display_name FROM _tables ORDER BY name")?;
    let tables = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tables)
}

/// Row shape before the type tag and property are decoded
struct RawField {
    id: i64,
    name: String,
    field_type: String,
    table_name: String,
    table_column_name: String,
    property: Option<String>,
}

impl RawField {
    fn into_field(self) -> Result<Field> {
        let field_type: FieldType = self.field_type.parse()?;
        let property = self
            .property
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(Field {
            id: self.id,
            name: self.name,
            field_type,
            table_name: self.table_name,
            table_column_name: self.table_column_name,
            property,
        })
    }
}

fn row_to_raw_field(row: &rusqlite::Row) -> rusqlite::Result<RawField> {
    Ok(RawField {
        id: row.get(0)?,
        name: row.get(1)?,
        field_type: row.get(2)?,
        table_name: row.get(3)?,
        table_column_name: row.get(4)?,
        property: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::LinkProperty;
    use crate::storage::SqliteStore;

    #[test]
    fn test_field_crud() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.conn();

        let field = Field::new("Age", FieldType::Number, "people", "cl_age");
        let id = insert_field(conn, &field).unwrap();
        assert!(id > 0);

        let stored = require_field(conn, "people", "cl_age").unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.field_type, FieldType::Number);
        assert_eq!(stored.property, None);

        rename_field(conn, "people", "cl_age", "Years").unwrap();
        assert_eq!(require_field(conn, "people", "cl_age").unwrap().name, "Years");

        delete_field(conn, "people", "cl_age").unwrap();
        assert!(get_field(conn, "people", "cl_age").unwrap().is_none());
        assert!(matches!(
            rename_field(conn, "people", "cl_age", "x"),
            Err(Error::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.conn();
        let field = Field::new("A", FieldType::Text, "t", "cl_a");
        insert_field(conn, &field).unwrap();
        assert!(matches!(insert_field(conn, &field), Err(Error::Storage(_))));
    }

    #[test]
    fn test_link_fields_targeting() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.conn();

        let to_authors =
            Field::link("Authors", "books", "cl_a", LinkProperty::new("authors", "cl_b")).unwrap();
        let to_books =
            Field::link("Books", "authors", "cl_b", LinkProperty::new("books", "cl_a")).unwrap();
        insert_field(conn, &to_authors).unwrap();
        insert_field(conn, &to_books).unwrap();
        insert_field(conn, &Field::new("Name", FieldType::Text, "books", "cl_n")).unwrap();

        let targeting = link_fields_targeting(conn, "authors").unwrap();
        assert_eq!(targeting.len(), 1);
        assert_eq!(targeting[0].table_name, "books");
        assert_eq!(list_fields(conn, "books").unwrap().len(), 2);
    }

    #[test]
    fn test_table_registry() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.conn();

        register_table(conn, "tb_books", "Books").unwrap();
        assert_eq!(table_display_name(conn, "tb_books").unwrap().as_deref(), Some("Books"));
        assert_eq!(table_display_name(conn, "missing").unwrap(), None);
        assert_eq!(list_tables(conn).unwrap(), vec![("tb_books".to_string(), "Books".to_string())]);
    }
}
