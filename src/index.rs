//! Index advisor - idempotent secondary index creation
//!
//! Indexes are an optimization, never a correctness requirement: callers
//! that only want a faster grid go through [`ensure_index_best_effort`],
//! which logs failures and carries on.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::naming;
use crate::storage::sqlite::index_exists;
use crate::{Error, Result};

/// What `ensure_index` found or did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Created(String),
    Exists(String),
}

impl IndexOutcome {
    pub fn name(&self) -> &str {
        match self {
            IndexOutcome::Created(name) | IndexOutcome::Exists(name) => name,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, IndexOutcome::Created(_))
    }
}

/// Notifications around the CREATE INDEX statement, e.g. for a spinner.
///
/// Hooks only fire when an index is actually built; `on_end` is skipped when
/// creation fails.
#[derive(Default)]
pub struct IndexHooks<'a> {
    on_start: Option<Box<dyn FnOnce() + 'a>>,
    on_end: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a> IndexHooks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, hook: impl FnOnce() + 'a) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    pub fn on_end(mut self, hook: impl FnOnce() + 'a) -> Self {
        self.on_end = Some(Box::new(hook));
        self
    }
}

/// Create `idx__<table>__<column>` unless the catalog already has it.
pub fn ensure_index(
    conn: &Connection,
    table: &str,
    column: &str,
    hooks: IndexHooks<'_>,
) -> Result<IndexOutcome> {
    let name = naming::index_name(table, column)?;
    let index_error = |source| Error::Index {
        index: name.clone(),
        source,
    };

    if index_exists(conn, &name).map_err(index_error)? {
        debug!(index = %name, "index already exists");
        return Ok(IndexOutcome::Exists(name));
    }

    if let Some(on_start) = hooks.on_start {
        on_start();
    }
    conn.execute(&format!("CREATE INDEX {} ON {} ({})", name, table, column), [])
        .map_err(index_error)?;
    if let Some(on_end) = hooks.on_end {
        on_end();
    }

    info!(index = %name, table, column, "index created");
    Ok(IndexOutcome::Created(name))
}

/// [`ensure_index`] with the error logged and discarded.
pub fn ensure_index_best_effort(
    conn: &Connection,
    table: &str,
    column: &str,
    hooks: IndexHooks<'_>,
) -> Option<IndexOutcome> {
    match ensure_index(conn, table, column, hooks) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!(table, column, error = %e, "skipping index creation");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use std::cell::Cell;

    fn store_with_table() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.execute("CREATE TABLE books (_id TEXT PRIMARY KEY, title TEXT)", []).unwrap();
        store
    }

    fn count_indexes(store: &SqliteStore, name: &str) -> i64 {
        store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn test_ensure_index_is_idempotent() {
        let store = store_with_table();

        let first = ensure_index(store.conn(), "books", "title", IndexHooks::new()).unwrap();
        assert_eq!(first, IndexOutcome::Created("idx__books__title".to_string()));

        let second = ensure_index(store.conn(), "books", "title", IndexHooks::new()).unwrap();
        assert_eq!(second, IndexOutcome::Exists("idx__books__title".to_string()));

        assert_eq!(count_indexes(&store, "idx__books__title"), 1);
        assert!(store.index_exists("idx__books__title").unwrap());
    }

    #[test]
    fn test_hooks_fire_only_on_creation() {
        let store = store_with_table();
        let started = Cell::new(0);
        let ended = Cell::new(0);

        for _ in 0..2 {
            let hooks = IndexHooks::new()
                .on_start(|| started.set(started.get() + 1))
                .on_end(|| ended.set(ended.get() + 1));
            ensure_index(store.conn(), "books", "title", hooks).unwrap();
        }

        assert_eq!(started.get(), 1);
        assert_eq!(ended.get(), 1);
    }

    #[test]
    fn test_failure_is_index_error() {
        let store = store_with_table();
        let ended = Cell::new(false);
        let hooks = IndexHooks::new().on_end(|| ended.set(true));

        let result = ensure_index(store.conn(), "missing", "title", hooks);
        assert!(matches!(result, Err(Error::Index { ref index, .. }) if index == "idx__missing__title"));
        assert!(!ended.get());
    }

    #[test]
    fn test_best_effort_swallows_errors() {
        let store = store_with_table();
        assert!(ensure_index_best_effort(store.conn(), "books", "nope", IndexHooks::new()).is_none());
        assert!(ensure_index_best_effort(store.conn(), "books", "bad name", IndexHooks::new()).is_none());

        let outcome = ensure_index_best_effort(store.conn(), "books", "title", IndexHooks::new()).unwrap();
        assert!(outcome.created());
        assert_eq!(outcome.name(), "idx__books__title");
    }
}
