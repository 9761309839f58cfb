//! Table manager - the coordination surface for one data table
//!
//! Routes field CRUD, cell writes and index requests to the link engine,
//! the index advisor and the rewriter, so callers never touch relation
//! tables or title caches directly.

use std::collections::HashMap;

use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use crate::field::{Field, FieldType, LinkProperty};
use crate::index::{self, IndexHooks, IndexOutcome};
use crate::link::{LinkDiff, LinkFieldService};
use crate::naming::{self, ID_COLUMN, TITLE_COLUMN};
use crate::query::{self, OrderSpec, SortDirection};
use crate::storage::{metadata, schema, Record, SqliteStore};
use crate::{Error, Result};

/// Facade over one data table
pub struct TableManager<'a> {
    store: &'a SqliteStore,
    table_name: String,
}

impl<'a> TableManager<'a> {
    /// Create a data table and register its display name
    pub fn create(store: &'a SqliteStore, table_name: &str, display_name: &str) -> Result<Self> {
        let table_name = naming::validate_identifier(table_name)?.to_string();
        store.transaction(|conn| {
            conn.execute(&schema::create_data_table(&table_name)?, [])?;
            metadata::register_table(conn, &table_name, display_name)?;
            Ok(())
        })?;
        info!(table = %table_name, display_name, "table created");
        Ok(Self { store, table_name })
    }

    /// Attach to an existing data table
    pub fn open(store: &'a SqliteStore, table_name: &str) -> Result<Self> {
        let table_name = naming::validate_identifier(table_name)?.to_string();
        if !store.table_exists(&table_name)? {
            return Err(Error::TableNotFound(table_name));
        }
        Ok(Self { store, table_name })
    }

    pub fn name(&self) -> &str {
        &self.table_name
    }

    /// Registered display name, falling back to the raw name
    pub fn display_name(&self) -> Result<String> {
        Ok(metadata::table_display_name(self.store.conn(), &self.table_name)?
            .unwrap_or_else(|| self.table_name.clone()))
    }

    fn links(&self) -> LinkFieldService<'a> {
        LinkFieldService::new(self.store)
    }

    // ========== Fields ==========

    /// All field descriptors of this table
    pub fn fields(&self) -> Result<Vec<Field>> {
        metadata::list_fields(self.store.conn(), &self.table_name)
    }

    pub fn get_field(&self, column: &str) -> Result<Field> {
        metadata::require_field(self.store.conn(), &self.table_name, column)
    }

    /// Type of every addressable column, built-ins included
    pub fn field_types(&self) -> Result<HashMap<String, FieldType>> {
        let mut types: HashMap<String, FieldType> = self
            .fields()?
            .into_iter()
            .map(|field| (field.table_column_name, field.field_type))
            .collect();
        types.insert(ID_COLUMN.to_string(), FieldType::Text);
        types.insert(TITLE_COLUMN.to_string(), FieldType::Title);
        Ok(types)
    }

    /// Add a scalar field with a generated column name
    pub fn add_field(&self, name: &str, field_type: FieldType) -> Result<Field> {
        if field_type == FieldType::Link {
            return Err(Error::MissingLinkTarget(name.to_string()));
        }

        let field = Field::new(name, field_type, self.table_name.clone(), naming::generate_column_name());
        let id = self.store.transaction(|conn| {
            let id = metadata::insert_field(conn, &field)?;
            conn.execute(&schema::add_text_column(&field.table_name, &field.table_column_name)?, [])?;
            Ok(id)
        })?;

        info!(field = %field.qualified_name(), field_type = %field_type, "field added");
        Ok(Field { id, ..field })
    }

    /// Add a link to `target_table`; returns the forward and the paired field
    pub fn add_link_field(&self, name: &str, target_table: &str) -> Result<(Field, Field)> {
        if !self.store.table_exists(naming::validate_identifier(target_table)?)? {
            return Err(Error::TableNotFound(target_table.to_string()));
        }

        let field = Field::link(
            name,
            self.table_name.clone(),
            naming::generate_column_name(),
            LinkProperty::new(target_table, naming::generate_column_name()),
        )?;
        self.links().add(&field)
    }

    pub fn rename_field(&self, column: &str, name: &str) -> Result<()> {
        metadata::rename_field(self.store.conn(), &self.table_name, column, name)
    }

    /// Delete a field and its column; link fields take their pair with them
    pub fn delete_field(&self, column: &str) -> Result<()> {
        let field = self.get_field(column)?;
        if field.is_link() {
            return self.links().remove(&field);
        }

        self.store.transaction(|conn| {
            metadata::delete_field(conn, &self.table_name, column)?;
            conn.execute(
                &format!("DROP INDEX IF EXISTS {}", naming::index_name(&self.table_name, column)?),
                [],
            )?;
            conn.execute(&schema::drop_column(&self.table_name, column)?, [])?;
            Ok(())
        })?;
        info!(field = %field.qualified_name(), "field deleted");
        Ok(())
    }

    // ========== Rows & cells ==========

    /// Insert a row, generating a UUID when no id is given
    pub fn insert_row(&self, title: &str, id: Option<&str>) -> Result<String> {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        self.store.execute(
            &format!(
                "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
                self.table_name, ID_COLUMN, TITLE_COLUMN
            ),
            params![id, title],
        )?;
        Ok(id)
    }

    /// Change a row's title and refresh every title cache that shows it.
    /// Returns the number of referencing rows refreshed.
    pub fn set_title(&self, row_id: &str, title: Option<&str>) -> Result<usize> {
        let links = self.links();
        let refreshed = self.store.transaction(|conn| {
            conn.execute(
                &format!("UPDATE {} SET {} = ?1 WHERE {} = ?2", self.table_name, TITLE_COLUMN, ID_COLUMN),
                params![title, row_id],
            )?;
            links.propagate_title(conn, &self.table_name, row_id)
        })?;
        debug!(table = %self.table_name, row_id, refreshed, "title propagated");
        Ok(refreshed)
    }

    /// Current text of one cell
    pub fn get_cell(&self, column: &str, row_id: &str) -> Result<Option<String>> {
        let column = naming::validate_identifier(column)?;
        let value: Option<Option<String>> = self
            .store
            .conn()
            .query_row(
                &format!("SELECT {} FROM {} WHERE {} = ?1", column, self.table_name, ID_COLUMN),
                [row_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    /// Write one cell. Link columns go through the link engine and report
    /// the membership change; title writes propagate into title caches.
    pub fn set_cell(&self, column: &str, row_id: &str, value: Option<&str>) -> Result<Option<LinkDiff>> {
        if column == TITLE_COLUMN {
            self.set_title(row_id, value)?;
            return Ok(None);
        }

        let field = self.get_field(column)?;
        if field.is_link() {
            let old_value = self.get_cell(column, row_id)?;
            let diff = self.links().update_cell(&field, row_id, value, old_value.as_deref())?;
            return Ok(Some(diff));
        }

        self.store.execute(
            &format!(
                "UPDATE {} SET {} = ?1 WHERE {} = ?2",
                self.table_name,
                naming::validate_identifier(column)?,
                ID_COLUMN
            ),
            params![value, row_id],
        )?;
        Ok(None)
    }

    // ========== Queries ==========

    /// One page of rows under the requested ordering, `_id` as tie-break
    pub fn query_page(&self, order_specs: &[OrderSpec], offset: u64, limit: u64) -> Result<Vec<Record>> {
        let mut specs = order_specs.to_vec();
        if !specs.is_empty() && !specs.iter().any(|spec| spec.column_id == ID_COLUMN) {
            specs.push(OrderSpec::new(ID_COLUMN, SortDirection::Asc));
        }

        let types = self.field_types()?;
        let base = format!("SELECT * FROM {}", self.table_name);
        let ordered = query::rewrite_with_explicit_order(&specs, &base, |column| types.get(column).copied())?;
        let paged = query::rewrite_with_offset_limit(&ordered, offset, limit)?;
        debug!(sql = %paged, "query page");
        self.store.query_rows(&paged, [])
    }

    /// Row identifiers of an arbitrary SELECT over this table, in its order
    pub fn row_ids(&self, sql: &str) -> Result<Vec<String>> {
        let rewritten = query::rewrite_for_sorted_ids_compat(sql)?;
        let rows = self.store.query_rows(&rewritten, [])?;
        Ok(rows.iter().filter_map(|row| row.text(ID_COLUMN)).collect())
    }

    // ========== Indexes ==========

    /// Best-effort index on one column; failures are logged, never returned
    pub fn ensure_index(&self, column: &str, hooks: IndexHooks<'_>) -> Option<IndexOutcome> {
        index::ensure_index_best_effort(self.store.conn(), &self.table_name, column, hooks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkState;

    fn library(store: &SqliteStore) -> (TableManager<'_>, TableManager<'_>) {
        let books = TableManager::create(store, "books", "Books").unwrap();
        let authors = TableManager::create(store, "authors", "Authors").unwrap();
        for (id, title) in [("b1", "Dune"), ("b2", "Emma")] {
            books.insert_row(title, Some(id)).unwrap();
        }
        for (id, title) in [("a1", "Herbert"), ("a2", "Austen")] {
            authors.insert_row(title, Some(id)).unwrap();
        }
        (books, authors)
    }

    #[test]
    fn test_create_and_open() {
        let store = SqliteStore::open_in_memory().unwrap();
        let books = TableManager::create(&store, "books", "Books").unwrap();
        assert_eq!(books.display_name().unwrap(), "Books");

        assert!(TableManager::open(&store, "books").is_ok());
        assert!(matches!(TableManager::open(&store, "nope"), Err(Error::TableNotFound(_))));
        assert!(matches!(
            TableManager::create(&store, "bad name", "x"),
            Err(Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_scalar_field_crud() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (books, _) = library(&store);

        let pages = books.add_field("Pages", FieldType::Number).unwrap();
        assert!(pages.table_column_name.starts_with("cl_"));
        books.set_cell(&pages.table_column_name, "b1", Some("412")).unwrap();
        assert_eq!(books.get_cell(&pages.table_column_name, "b1").unwrap().as_deref(), Some("412"));

        books.rename_field(&pages.table_column_name, "Page count").unwrap();
        assert_eq!(books.get_field(&pages.table_column_name).unwrap().name, "Page count");

        books.delete_field(&pages.table_column_name).unwrap();
        assert!(books.fields().unwrap().is_empty());
        assert!(books.get_cell(&pages.table_column_name, "b1").is_err());
    }

    #[test]
    fn test_add_field_rejects_bare_link() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (books, _) = library(&store);
        assert!(matches!(
            books.add_field("Authors", FieldType::Link),
            Err(Error::MissingLinkTarget(_))
        ));
        assert!(matches!(
            books.add_link_field("Authors", "publishers"),
            Err(Error::TableNotFound(_))
        ));
    }

    #[test]
    fn test_link_cells_through_facade() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (books, authors) = library(&store);
        let (forward, paired) = books.add_link_field("Authors", "authors").unwrap();
        assert!(paired.name.starts_with("Authors_"));
        assert_eq!(
            LinkFieldService::new(&store).state(store.conn(), &forward).unwrap(),
            LinkState::Live
        );

        let column = &forward.table_column_name;
        let diff = books.set_cell(column, "b1", Some("a1,a2")).unwrap().unwrap();
        assert_eq!(diff.added, vec!["a1", "a2"]);

        let diff = books.set_cell(column, "b1", Some("a2")).unwrap().unwrap();
        assert_eq!(diff.removed, vec!["a1"]);
        assert!(diff.added.is_empty());

        let reverse = &paired.table_column_name;
        assert_eq!(authors.get_cell(reverse, "a2").unwrap().as_deref(), Some("b1"));
        assert_eq!(authors.get_cell(reverse, "a1").unwrap(), None);

        let title_column = format!("{}__title", column);
        assert_eq!(books.get_cell(&title_column, "b1").unwrap().as_deref(), Some("Austen"));
    }

    #[test]
    fn test_title_change_propagates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (books, authors) = library(&store);
        let (forward, _) = books.add_link_field("Authors", "authors").unwrap();
        books.set_cell(&forward.table_column_name, "b1", Some("a1,a2")).unwrap();

        let refreshed = authors.set_cell(TITLE_COLUMN, "a2", Some("Jane Austen")).unwrap();
        assert!(refreshed.is_none());

        let title_column = format!("{}__title", forward.table_column_name);
        assert_eq!(
            books.get_cell(&title_column, "b1").unwrap().as_deref(),
            Some("Herbert,Jane Austen")
        );
    }

    #[test]
    fn test_delete_link_field_removes_pair() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (books, authors) = library(&store);
        let (forward, _) = books.add_link_field("Authors", "authors").unwrap();

        books.delete_field(&forward.table_column_name).unwrap();
        assert!(books.fields().unwrap().is_empty());
        assert!(authors.fields().unwrap().is_empty());
    }

    #[test]
    fn test_query_page_numeric_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (books, _) = library(&store);
        books.insert_row("Ulysses", Some("b3")).unwrap();
        let pages = books.add_field("Pages", FieldType::Number).unwrap();
        let column = pages.table_column_name.clone();
        for (id, value) in [("b1", "412"), ("b2", "96"), ("b3", "1000")] {
            books.set_cell(&column, id, Some(value)).unwrap();
        }

        let page = books
            .query_page(&[OrderSpec::new(column.clone(), SortDirection::Asc)], 0, 2)
            .unwrap();
        let ids: Vec<_> = page.iter().filter_map(|r| r.text(ID_COLUMN)).collect();
        assert_eq!(ids, vec!["b2", "b1"]);

        let next = books
            .query_page(&[OrderSpec::new(column, SortDirection::Asc)], 2, 2)
            .unwrap();
        let ids: Vec<_> = next.iter().filter_map(|r| r.text(ID_COLUMN)).collect();
        assert_eq!(ids, vec!["b3"]);

        let default_order = books.query_page(&[], 0, 10).unwrap();
        let ids: Vec<_> = default_order.iter().filter_map(|r| r.text(ID_COLUMN)).collect();
        assert_eq!(ids, vec!["b1", "b2", "b3"]);
    }

    #[test]
    fn test_query_page_breaks_ties_by_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let books = TableManager::create(&store, "books", "Books").unwrap();
        let pages = books.add_field("Pages", FieldType::Number).unwrap();
        let column = pages.table_column_name.clone();
        for (id, value) in [("b4", "100"), ("b2", "100"), ("b3", "100"), ("b1", "50")] {
            books.insert_row(id, Some(id)).unwrap();
            books.set_cell(&column, id, Some(value)).unwrap();
        }

        let sort = [OrderSpec::new(column, SortDirection::Asc)];
        let mut ids = Vec::new();
        for offset in [0, 2] {
            let page = books.query_page(&sort, offset, 2).unwrap();
            ids.extend(page.iter().filter_map(|r| r.text(ID_COLUMN)));
        }
        assert_eq!(ids, vec!["b1", "b2", "b3", "b4"]);

        let by_id = books
            .query_page(&[OrderSpec::new(ID_COLUMN, SortDirection::Desc)], 0, 4)
            .unwrap();
        let ids: Vec<_> = by_id.iter().filter_map(|r| r.text(ID_COLUMN)).collect();
        assert_eq!(ids, vec!["b4", "b3", "b2", "b1"]);
    }

    #[test]
    fn test_clearing_title_stores_null() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (books, _) = library(&store);
        books.set_cell(TITLE_COLUMN, "b1", None).unwrap();

        let title: Option<String> = store
            .conn()
            .query_row("SELECT title FROM books WHERE _id = 'b1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(title, None);
    }

    #[test]
    fn test_row_ids_in_query_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (books, _) = library(&store);

        assert_eq!(books.row_ids("SELECT * FROM books").unwrap(), vec!["b1", "b2"]);
        assert_eq!(
            books.row_ids("SELECT * FROM books ORDER BY title DESC").unwrap(),
            vec!["b2", "b1"]
        );
    }

    #[test]
    fn test_ensure_index_never_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (books, _) = library(&store);

        assert!(books.ensure_index(TITLE_COLUMN, IndexHooks::new()).unwrap().created());
        assert!(!books.ensure_index(TITLE_COLUMN, IndexHooks::new()).unwrap().created());
        assert!(books.ensure_index("missing", IndexHooks::new()).is_none());
    }

    #[test]
    fn test_generated_row_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let books = TableManager::create(&store, "books", "Books").unwrap();
        let id = books.insert_row("Dune", None).unwrap();
        assert_eq!(id.len(), 32);
        assert_eq!(books.get_cell(TITLE_COLUMN, &id).unwrap().as_deref(), Some("Dune"));
    }
}
