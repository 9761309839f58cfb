//! SQLite storage implementation

use std::path::Path;
use rusqlite::{Connection, OptionalExtension, Params};
use rusqlite::types::Value;
use serde::Serialize;
use crate::Result;
use super::schema;

/// SQLite-backed store handle.
///
/// Every engine operation takes the connection explicitly; `transaction`
/// hands the closure a connection scoped to one all-or-nothing unit.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    /// The default session, outside of any explicit transaction
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a single statement, returning the number of changed rows
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        Ok(self.conn.execute(sql, params)?)
    }

    /// Run a query and collect every row
    pub fn query_rows<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Record>> {
        query_records(&self.conn, sql, params)
    }

    /// Run `body` inside one transaction.
    ///
    /// Commits when `body` returns `Ok`. On `Err` (or a panic) the transaction
    /// is dropped uncommitted and SQLite rolls every statement back.
    pub fn transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let value = body(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Check the system catalog for an index
    pub fn index_exists(&self, name: &str) -> Result<bool> {
        Ok(index_exists(&self.conn, name)?)
    }

    /// Check the system catalog for a table
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let tables: i64 = self.conn.query_row("SELECT COUNT(*) FROM _tables", [], |row| row.get(0))?;
        let fields: i64 = self.conn.query_row("SELECT COUNT(*) FROM _fields", [], |row| row.get(0))?;
        let link_fields: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM _fields WHERE type = 'link'",
            [],
            |row| row.get(0),
        )?;
        let indexes: i64 = self.conn.query_row(
            r"SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx\_\_%' ESCAPE '\'",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            r"SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'lk\_%' ESCAPE '\'",
        )?;
        let relation_tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        let mut relation_rows = 0usize;
        for table in &relation_tables {
            // Names come from the catalog filtered on the lk_ prefix
            let count: i64 = self.conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| row.get(0))?;
            relation_rows += count as usize;
        }

        Ok(DbStats {
            tables: tables as usize,
            fields: fields as usize,
            link_fields: link_fields as usize,
            relation_tables: relation_tables.len(),
            relation_rows,
            indexes: indexes as usize,
        })
    }
}

/// Catalog lookup shared by the store and the index advisor
pub(crate) fn index_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Run a query on any connection (including a transaction scope) and collect rows
pub fn query_records<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params)?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..columns.len())
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        records.push(Record {
            columns: columns.clone(),
            values,
        });
    }
    Ok(records)
}

/// One result row, columns kept in statement order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Record {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Raw value of a named column
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Value of a named column rendered as text; NULL and blobs yield `None`
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(value_to_text)
    }

    /// Column/value pairs as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| {
                let json = match value {
                    Value::Null => serde_json::Value::Null,
                    Value::Integer(i) => serde_json::Value::from(*i),
                    Value::Real(f) => serde_json::Value::from(*f),
                    Value::Text(s) => serde_json::Value::from(s.clone()),
                    Value::Blob(b) => serde_json::Value::from(format!("<{} bytes>", b.len())),
                };
                (column.clone(), json)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Render a scalar SQLite value as text
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Blob(_) => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s.clone()),
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub tables: usize,
    pub fields: usize,
    pub link_fields: usize,
    pub relation_tables: usize,
    pub relation_rows: usize,
    pub indexes: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Tables: {}", self.tables)?;
        writeln!(f, "  Fields: {} ({} link)", self.fields, self.link_fields)?;
        writeln!(f, "  Relation tables: {}", self.relation_tables)?;
        writeln!(f, "  Relation rows: {}", self.relation_rows)?;
        writeln!(f, "  Indexes: {}", self.indexes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_schema_initialized() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.table_exists("_fields").unwrap());
        assert!(store.table_exists("_tables").unwrap());
        assert!(!store.table_exists("books").unwrap());
    }

    #[test]
    fn test_query_rows_keeps_column_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.execute("CREATE TABLE t (_id TEXT PRIMARY KEY, title TEXT, n INTEGER)", []).unwrap();
        store.execute("INSERT INTO t VALUES ('a', 'Alpha', 3)", []).unwrap();
        store.execute("INSERT INTO t VALUES ('b', NULL, 4)", []).unwrap();

        let rows = store.query_rows("SELECT title, _id, n FROM t ORDER BY _id", []).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns().to_vec(), vec!["title", "_id", "n"]);
        assert_eq!(rows[0].text("title").as_deref(), Some("Alpha"));
        assert_eq!(rows[0].text("n").as_deref(), Some("3"));
        assert_eq!(rows[1].text("title"), None);
        assert_eq!(rows[1].to_json()["n"], serde_json::json!(4));
    }

    #[test]
    fn test_transaction_commits() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.execute("CREATE TABLE t (v TEXT)", []).unwrap();

        store
            .transaction(|conn| {
                conn.execute("INSERT INTO t VALUES ('x')", [])?;
                conn.execute("INSERT INTO t VALUES ('y')", [])?;
                Ok(())
            })
            .unwrap();

        assert_eq!(store.query_rows("SELECT v FROM t", []).unwrap().len(), 2);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.execute("CREATE TABLE t (v TEXT PRIMARY KEY)", []).unwrap();

        let result: Result<()> = store.transaction(|conn| {
            conn.execute("INSERT INTO t VALUES ('x')", [])?;
            conn.execute("INSERT INTO t VALUES ('x')", [])?;
            Ok(())
        });

        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(store.query_rows("SELECT v FROM t", []).unwrap().is_empty());
    }

    #[test]
    fn test_stats_on_empty_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.tables, 0);
        assert_eq!(stats.relation_rows, 0);
        assert!(stats.to_string().contains("Relation tables: 0"));
    }
}
