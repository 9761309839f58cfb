//! Link field service - provisioning, cell updates and cache maintenance

use std::collections::HashMap;

use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;
use tracing::{debug, info};

use super::{compute_diff, derive_paired_field, split_ids, LinkDiff, LinkSide, LinkState};
use crate::field::Field;
use crate::naming::{self, ID_COLUMN, TITLE_COLUMN};
use crate::storage::{metadata, query_records, schema, SqliteStore};
use crate::{Error, Result};

/// A relation row whose mirror is missing on the other side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosureViolation {
    /// Relation table holding the orphaned row
    pub relation_table: String,
    pub self_id: String,
    pub ref_id: String,
    pub link_field_id: String,
}

impl std::fmt::Display for ClosureViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: ({}, {}, {}) has no mirror",
            self.relation_table, self.self_id, self.ref_id, self.link_field_id
        )
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

fn join_or_null(ids: &[String]) -> Option<String> {
    if ids.is_empty() {
        None
    } else {
        Some(ids.join(","))
    }
}

/// Link field engine bound to one store.
///
/// Mutating entry points open their own transaction; the `conn`-taking
/// helpers run inside whatever scope the caller hands them.
pub struct LinkFieldService<'a> {
    store: &'a SqliteStore,
}

impl<'a> LinkFieldService<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    // ========== Provisioning ==========

    /// Persist a forward link field together with its paired reverse field
    /// and the physical schema both need. All or nothing.
    pub fn add(&self, field: &Field) -> Result<(Field, Field)> {
        self.store
            .transaction(|conn| {
                let mut forward = field.clone();
                forward.id = metadata::insert_field(conn, &forward)?;
                let paired = self.provision(conn, &forward)?;
                Ok((forward, paired))
            })
            .map_err(|source| Error::SchemaProvision {
                field: field.qualified_name(),
                source: Box::new(source),
            })
    }

    /// Insert the paired descriptor, add value and title columns on both
    /// tables, and create both relation tables.
    pub fn provision(&self, conn: &Connection, field: &Field) -> Result<Field> {
        let side = LinkSide::from_field(field)?;
        let target_display = metadata::table_display_name(conn, &side.linked_table)?
            .unwrap_or_else(|| side.linked_table.clone());

        let mut paired = derive_paired_field(field, &target_display)?;
        paired.id = metadata::insert_field(conn, &paired)?;

        for s in [&side, &side.paired()] {
            conn.execute(&schema::add_text_column(&s.table, &s.column)?, [])?;
            conn.execute(&schema::add_text_column(&s.table, &s.title_column()?)?, [])?;
        }
        conn.execute(&schema::create_relation_table(&side.relation_table()?)?, [])?;
        conn.execute(&schema::create_relation_table(&side.reverse_relation_table()?)?, [])?;

        info!(
            field = %field.qualified_name(),
            paired = %paired.qualified_name(),
            paired_name = %paired.name,
            "link field provisioned"
        );
        Ok(paired)
    }

    /// The paired descriptor as stored in the metadata table
    pub fn paired_field(&self, conn: &Connection, field: &Field) -> Result<Field> {
        let side = LinkSide::from_field(field)?;
        metadata::require_field(conn, &side.linked_table, &side.linked_column)
    }

    /// Where a link pair is in its lifecycle
    pub fn state(&self, conn: &Connection, field: &Field) -> Result<LinkState> {
        let side = LinkSide::from_field(field)?;
        let paired_side = side.paired();

        let mut schema_complete = table_exists(conn, &side.relation_table()?)?
            && table_exists(conn, &side.reverse_relation_table()?)?;
        for s in [&side, &paired_side] {
            schema_complete = schema_complete
                && column_exists(conn, &s.table, &s.column)?
                && column_exists(conn, &s.table, &s.title_column()?)?;
        }
        if !schema_complete {
            return Ok(LinkState::Declared);
        }

        let closed = match metadata::get_field(conn, &side.linked_table, &side.linked_column)? {
            Some(paired) if paired.is_link() => LinkSide::from_field(&paired)? == paired_side,
            _ => false,
        };
        Ok(if closed { LinkState::Live } else { LinkState::SchemaProvisioned })
    }

    /// Drop a link pair: both descriptors, their relation rows and the four
    /// physical columns.
    pub fn remove(&self, field: &Field) -> Result<()> {
        let side = LinkSide::from_field(field)?;
        let paired = side.paired();

        self.store.transaction(|conn| {
            conn.execute(
                &format!("DELETE FROM {} WHERE link_field_id = ?1", side.relation_table()?),
                [&side.column],
            )?;
            conn.execute(
                &format!("DELETE FROM {} WHERE link_field_id = ?1", side.reverse_relation_table()?),
                [&paired.column],
            )?;

            for s in [&side, &paired] {
                metadata::delete_field(conn, &s.table, &s.column)?;
                conn.execute(&format!("DROP INDEX IF EXISTS {}", naming::index_name(&s.table, &s.column)?), [])?;
                conn.execute(&schema::drop_column(&s.table, &s.title_column()?)?, [])?;
                conn.execute(&schema::drop_column(&s.table, &s.column)?, [])?;
            }
            Ok(())
        })?;

        info!(field = %field.qualified_name(), "link field removed");
        Ok(())
    }

    // ========== Cell updates ==========

    /// Write a link cell and keep both directions consistent.
    ///
    /// Runs as one transaction: relation rows on both sides, the value and
    /// title caches of every touched row on the linked table, and this row's
    /// own value and title. Any failure rolls everything back and surfaces as
    /// `Error::Mutation`.
    pub fn update_cell(
        &self,
        field: &Field,
        row_id: &str,
        new_value: Option<&str>,
        old_value: Option<&str>,
    ) -> Result<LinkDiff> {
        self.store
            .transaction(|conn| {
                let side = LinkSide::from_field(field)?;
                self.apply_cell_update(conn, &side, row_id, new_value, old_value)
            })
            .map_err(|source| Error::Mutation {
                table: field.table_name.clone(),
                column: field.table_column_name.clone(),
                row_id: row_id.to_string(),
                source: Box::new(source),
            })
    }

    /// The cell update protocol, inside the caller's transaction scope
    pub fn apply_cell_update(
        &self,
        conn: &Connection,
        side: &LinkSide,
        row_id: &str,
        new_value: Option<&str>,
        old_value: Option<&str>,
    ) -> Result<LinkDiff> {
        let diff = compute_diff(new_value, old_value);
        let relation_table = side.relation_table()?;
        let reverse_table = side.reverse_relation_table()?;

        if !diff.removed.is_empty() {
            let sql = format!(
                "DELETE FROM {} WHERE self = ? AND link_field_id = ? AND ref IN ({})",
                relation_table,
                placeholders(diff.removed.len())
            );
            let bind = [row_id, side.column.as_str()]
                .into_iter()
                .chain(diff.removed.iter().map(String::as_str));
            conn.execute(&sql, params_from_iter(bind))?;
        }

        let delete_mirror = format!(
            "DELETE FROM {} WHERE self = ?1 AND ref = ?2 AND link_field_id = ?3",
            reverse_table
        );
        for removed in &diff.removed {
            conn.execute(&delete_mirror, params![removed, row_id, side.linked_column])?;
        }

        let insert_forward = format!(
            "INSERT OR IGNORE INTO {} (self, ref, link_field_id) VALUES (?1, ?2, ?3)",
            relation_table
        );
        let insert_mirror = format!(
            "INSERT OR IGNORE INTO {} (self, ref, link_field_id) VALUES (?1, ?2, ?3)",
            reverse_table
        );
        for added in &diff.added {
            conn.execute(&insert_forward, params![row_id, added, side.column])?;
            conn.execute(&insert_mirror, params![added, row_id, side.linked_column])?;
        }

        let touched = diff.touched();
        self.refresh_rows(conn, &side.paired(), &touched)?;

        let value = new_value.filter(|v| !v.is_empty());
        let title = self.lookup_titles(conn, side, value)?;
        conn.execute(
            &format!(
                "UPDATE {} SET {} = ?1, {} = ?2 WHERE {} = ?3",
                side.table,
                side.column,
                side.title_column()?,
                ID_COLUMN
            ),
            params![value, title, row_id],
        )?;

        debug!(
            table = %side.table,
            column = %side.column,
            row_id,
            added = diff.added.len(),
            removed = diff.removed.len(),
            touched = touched.len(),
            "link cell updated"
        );
        Ok(diff)
    }

    // ========== Reads ==========

    /// Joined titles of the rows referenced by a comma-joined id list.
    ///
    /// One batched `WHERE _id IN (...)` lookup against the linked table.
    /// Titles follow the first appearance of each id; ids without a row are
    /// skipped. Absent or empty input yields `None`.
    pub fn lookup_titles(&self, conn: &Connection, side: &LinkSide, value: Option<&str>) -> Result<Option<String>> {
        let ids = split_ids(value);
        if ids.is_empty() {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {}, {} FROM {} WHERE {} IN ({})",
            ID_COLUMN,
            TITLE_COLUMN,
            side.linked_table,
            ID_COLUMN,
            placeholders(ids.len())
        );
        let rows = query_records(conn, &sql, params_from_iter(ids.iter()))?;
        let titles: HashMap<String, String> = rows
            .iter()
            .filter_map(|row| Some((row.text(ID_COLUMN)?, row.text(TITLE_COLUMN).unwrap_or_default())))
            .collect();

        let mut seen: Vec<&str> = Vec::with_capacity(ids.len());
        let mut joined: Vec<&str> = Vec::with_capacity(ids.len());
        for id in ids {
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            if let Some(title) = titles.get(id) {
                joined.push(title);
            }
        }
        Ok(Some(joined.join(",")))
    }

    /// Current references of `row_ids` according to the relation table,
    /// grouped by row in insertion order.
    pub fn link_cell_values(
        &self,
        conn: &Connection,
        side: &LinkSide,
        row_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        if row_ids.is_empty() {
            return Ok(grouped);
        }

        let sql = format!(
            "SELECT self, ref FROM {} WHERE link_field_id = ? AND self IN ({}) ORDER BY rowid",
            side.relation_table()?,
            placeholders(row_ids.len())
        );
        let bind = std::iter::once(side.column.as_str()).chain(row_ids.iter().map(String::as_str));
        let mut stmt = conn.prepare(&sql)?;
        let pairs = stmt
            .query_map(params_from_iter(bind), |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for (self_id, ref_id) in pairs {
            grouped.entry(self_id).or_default().push(ref_id);
        }
        Ok(grouped)
    }

    // ========== Cache maintenance ==========

    /// Recompute value and title caches of `row_ids` on `side.table` from
    /// the relation table.
    pub fn refresh_rows(&self, conn: &Connection, side: &LinkSide, row_ids: &[String]) -> Result<usize> {
        let values = self.link_cell_values(conn, side, row_ids)?;
        let update = format!(
            "UPDATE {} SET {} = ?1, {} = ?2 WHERE {} = ?3",
            side.table,
            side.column,
            side.title_column()?,
            ID_COLUMN
        );

        for row_id in row_ids {
            let value = values.get(row_id).and_then(|refs| join_or_null(refs));
            let title = self.lookup_titles(conn, side, value.as_deref())?;
            conn.execute(&update, params![value, title, row_id])?;
        }
        Ok(row_ids.len())
    }

    /// Re-derive the caches of every row of a link field.
    pub fn refresh_cache(&self, field: &Field) -> Result<usize> {
        let side = LinkSide::from_field(field)?;
        let refreshed = self.store.transaction(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM {}", ID_COLUMN, side.table))?;
            let row_ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            self.refresh_rows(conn, &side, &row_ids)
        })?;

        info!(field = %field.qualified_name(), rows = refreshed, "link cache refreshed");
        Ok(refreshed)
    }

    /// Push a changed title of `row_id` on `table` into every title cache
    /// that references it.
    pub fn propagate_title(&self, conn: &Connection, table: &str, row_id: &str) -> Result<usize> {
        let mut refreshed = 0;
        for field in metadata::link_fields_targeting(conn, table)? {
            let side = LinkSide::from_field(&field)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT self FROM {} WHERE ref = ?1 AND link_field_id = ?2 ORDER BY rowid",
                side.relation_table()?
            ))?;
            let referencing = stmt
                .query_map(params![row_id, side.column], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            refreshed += self.refresh_rows(conn, &side, &referencing)?;
        }
        Ok(refreshed)
    }

    // ========== Verification ==========

    /// Relation rows of a link pair that lack their mirror, in either direction.
    pub fn verify_closure(&self, conn: &Connection, field: &Field) -> Result<Vec<ClosureViolation>> {
        let side = LinkSide::from_field(field)?;
        let mut violations = self.orphans(conn, &side)?;
        violations.extend(self.orphans(conn, &side.paired())?);
        Ok(violations)
    }

    fn orphans(&self, conn: &Connection, side: &LinkSide) -> Result<Vec<ClosureViolation>> {
        let relation_table = side.relation_table()?;
        let sql = format!(
            r#"
            SELECT f.self, f.ref FROM {forward} f
            WHERE f.link_field_id = ?1
              AND NOT EXISTS (
                SELECT 1 FROM {reverse} r
                WHERE r.self = f.ref AND r.ref = f.self AND r.link_field_id = ?2
              )
            ORDER BY f.rowid
            "#,
            forward = relation_table,
            reverse = side.reverse_relation_table()?,
        );
        let mut stmt = conn.prepare(&sql)?;
        let violations = stmt
            .query_map(params![side.column, side.linked_column], |row| {
                Ok(ClosureViolation {
                    relation_table: relation_table.clone(),
                    self_id: row.get(0)?,
                    ref_id: row.get(1)?,
                    link_field_id: side.column.clone(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(violations)
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
