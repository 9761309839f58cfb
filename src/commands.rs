use std::collections::HashMap;
use std::path::Path;

use linkstore::config::{self, LinkstoreConfig};
use linkstore::link::LinkState;
use linkstore::output::{emit_success, OutputMode};
use linkstore::storage::{metadata, SqliteStore};
use linkstore::ui::{self, index_hooks, Icons, Spinner};
use linkstore::{query, FieldType, LinkFieldService, OrderSpec, TableManager};
use owo_colors::OwoColorize;
use serde_json::json;

pub fn run_init(
    mode: OutputMode,
    config_path: &Path,
    config: &LinkstoreConfig,
    database: &Path,
    force: bool,
) -> anyhow::Result<()> {
    config::write_config(config_path, config, force)?;
    config::ensure_db_dir(database)?;
    SqliteStore::open(database)?;

    if mode.is_human() {
        ui::success(&format!("Wrote {}", config_path.display()));
        ui::info("Database", &database.display().to_string());
    }
    emit_success(
        mode,
        "init",
        json!({ "config": config_path.display().to_string(), "database": database.display().to_string() }),
    )
}

pub fn run_table_create(
    store: &SqliteStore,
    mode: OutputMode,
    name: &str,
    display: Option<&str>,
) -> anyhow::Result<()> {
    let table = TableManager::create(store, name, display.unwrap_or(name))?;
    if mode.is_human() {
        ui::success(&format!("{} Created table {}", Icons::TABLE, table.name()));
    }
    emit_success(mode, "table.create", json!({ "name": table.name(), "displayName": table.display_name()? }))
}

pub fn run_table_list(store: &SqliteStore, mode: OutputMode) -> anyhow::Result<()> {
    let tables = metadata::list_tables(store.conn())?;
    if mode.is_human() {
        if tables.is_empty() {
            println!("{}", ui::dim("No tables."));
        }
        for (name, display_name) in &tables {
            ui::summary_row(name, display_name);
        }
    }
    let data: Vec<_> = tables
        .iter()
        .map(|(name, display_name)| json!({ "name": name, "displayName": display_name }))
        .collect();
    emit_success(mode, "table.list", data)
}

pub fn run_row_add(
    store: &SqliteStore,
    mode: OutputMode,
    table: &str,
    title: &str,
    id: Option<&str>,
) -> anyhow::Result<()> {
    let table = TableManager::open(store, table)?;
    let id = table.insert_row(title, id)?;
    if mode.is_human() {
        ui::success(&format!("Inserted row {}", id));
    }
    emit_success(mode, "row.add", json!({ "id": id }))
}

pub fn run_field_add(
    store: &SqliteStore,
    mode: OutputMode,
    table: &str,
    name: &str,
    field_type: FieldType,
    target: Option<&str>,
) -> anyhow::Result<()> {
    let table = TableManager::open(store, table)?;

    match (field_type, target) {
        (FieldType::Link, Some(target)) => {
            let (forward, paired) = table.add_link_field(name, target)?;
            if mode.is_human() {
                ui::success(&format!("{} Linked {} <-> {}", Icons::LINK, forward.qualified_name(), paired.qualified_name()));
                ui::summary_row("paired field", &paired.name);
            }
            emit_success(mode, "field.add", json!({ "field": forward, "paired": paired }))
        }
        (FieldType::Link, None) => Err(linkstore::Error::MissingLinkTarget(name.to_string()).into()),
        (_, Some(_)) => anyhow::bail!("--target only applies to link fields"),
        (field_type, None) => {
            let field = table.add_field(name, field_type)?;
            if mode.is_human() {
                ui::success(&format!("Added {} field {}", field_type, field.qualified_name()));
            }
            emit_success(mode, "field.add", json!({ "field": field }))
        }
    }
}

pub fn run_field_list(store: &SqliteStore, mode: OutputMode, table: &str) -> anyhow::Result<()> {
    let table = TableManager::open(store, table)?;
    let fields = table.fields()?;
    if mode.is_human() {
        if fields.is_empty() {
            println!("{}", ui::dim("No fields besides title."));
        } else {
            println!("{}", ui::fields_table(&fields));
        }
    }
    emit_success(mode, "field.list", fields)
}

pub fn run_field_rename(
    store: &SqliteStore,
    mode: OutputMode,
    table: &str,
    column: &str,
    name: &str,
) -> anyhow::Result<()> {
    TableManager::open(store, table)?.rename_field(column, name)?;
    if mode.is_human() {
        ui::success(&format!("Renamed {}.{} to {}", table, column, name));
    }
    emit_success(mode, "field.rename", json!({ "column": column, "name": name }))
}

pub fn run_field_delete(store: &SqliteStore, mode: OutputMode, table: &str, column: &str) -> anyhow::Result<()> {
    TableManager::open(store, table)?.delete_field(column)?;
    if mode.is_human() {
        ui::success(&format!("Deleted {}.{}", table, column));
    }
    emit_success(mode, "field.delete", json!({ "column": column }))
}

pub fn run_cell_get(
    store: &SqliteStore,
    mode: OutputMode,
    table: &str,
    column: &str,
    row: &str,
) -> anyhow::Result<()> {
    let value = TableManager::open(store, table)?.get_cell(column, row)?;
    if mode.is_human() {
        println!("{}", value.as_deref().unwrap_or(""));
    }
    emit_success(mode, "cell.get", json!({ "row": row, "column": column, "value": value }))
}

pub fn run_cell_set(
    store: &SqliteStore,
    mode: OutputMode,
    table: &str,
    column: &str,
    row: &str,
    value: Option<&str>,
) -> anyhow::Result<()> {
    let diff = TableManager::open(store, table)?.set_cell(column, row, value)?;
    if mode.is_human() {
        ui::success(&format!("Updated {}.{} for {}", table, column, row));
        if let Some(diff) = &diff {
            ui::link_diff(diff);
        }
    }
    emit_success(mode, "cell.set", json!({ "row": row, "column": column, "diff": diff }))
}

pub fn run_rows(
    store: &SqliteStore,
    mode: OutputMode,
    table: &str,
    order_specs: &[OrderSpec],
    offset: u64,
    limit: u64,
) -> anyhow::Result<()> {
    let table = TableManager::open(store, table)?;
    let records = table.query_page(order_specs, offset, limit)?;

    if mode.is_human() {
        if records.is_empty() {
            println!("{}", ui::dim("No rows."));
        } else {
            let names: HashMap<String, String> = table
                .fields()?
                .into_iter()
                .map(|field| (field.table_column_name, field.name))
                .collect();
            println!("{}", ui::records_table(&records, &names));
            ui::summary_row("rows", &format!("{}..{}", offset, offset + records.len() as u64));
        }
    }
    let data: Vec<_> = records.iter().map(|record| record.to_json()).collect();
    emit_success(mode, "rows", data)
}

pub fn run_index(store: &SqliteStore, mode: OutputMode, table: &str, column: &str) -> anyhow::Result<()> {
    let table = TableManager::open(store, table)?;
    let spinner = Spinner::new(&format!("Building index on {}.{}", table.name(), column));
    let outcome = table.ensure_index(column, index_hooks(&spinner));

    match &outcome {
        Some(outcome) if mode.is_human() => {
            if !outcome.created() {
                spinner.clear();
            }
            let verb = if outcome.created() { "Created" } else { "Already present:" };
            ui::success(&format!("{} {} {}", Icons::BOLT, verb, outcome.name()));
        }
        None if mode.is_human() => {
            spinner.clear();
            ui::warn(&format!("Index on {}.{} skipped (see log)", table.name(), column));
        }
        _ => {}
    }
    emit_success(
        mode,
        "index",
        json!({
            "name": outcome.as_ref().map(|o| o.name().to_string()),
            "created": outcome.as_ref().is_some_and(|o| o.created()),
        }),
    )
}

/// A rewrite request as resolved from the command line
pub enum Rewrite {
    SortedIds { sql: String, use_temp_table: bool },
    Compat { sql: String },
    Page { sql: String, offset: u64, limit: u64 },
    Order { table: String, sql: String, order_specs: Vec<OrderSpec> },
    HasOrder { sql: String },
    Columns { sql: String },
}

pub fn run_rewrite(store: &SqliteStore, mode: OutputMode, request: Rewrite) -> anyhow::Result<()> {
    let (command, data) = match request {
        Rewrite::SortedIds { sql, use_temp_table } => {
            ("rewrite.sorted_ids", json!(query::rewrite_for_sorted_ids(&sql, use_temp_table)?))
        }
        Rewrite::Compat { sql } => ("rewrite.compat", json!(query::rewrite_for_sorted_ids_compat(&sql)?)),
        Rewrite::Page { sql, offset, limit } => {
            ("rewrite.page", json!(query::rewrite_with_offset_limit(&sql, offset, limit)?))
        }
        Rewrite::Order { table, sql, order_specs } => {
            let types = TableManager::open(store, &table)?.field_types()?;
            let rewritten =
                query::rewrite_with_explicit_order(&order_specs, &sql, |column| types.get(column).copied())?;
            ("rewrite.order", json!(rewritten))
        }
        Rewrite::HasOrder { sql } => ("rewrite.has_order", json!(query::has_order_by(Some(&sql))?)),
        Rewrite::Columns { sql } => ("rewrite.columns", json!(query::extract_order_columns(&sql)?)),
    };

    if mode.is_human() {
        match &data {
            serde_json::Value::String(sql) => println!("{}", sql),
            other => println!("{}", other),
        }
    }
    emit_success(mode, command, data)
}

pub fn run_check(store: &SqliteStore, mode: OutputMode, table: &str, column: &str) -> anyhow::Result<()> {
    let field = TableManager::open(store, table)?.get_field(column)?;
    if !field.is_link() {
        return Err(linkstore::Error::NotALinkField(field.qualified_name()).into());
    }

    let service = LinkFieldService::new(store);
    let state = service.state(store.conn(), &field)?;
    let violations = service.verify_closure(store.conn(), &field)?;

    if mode.is_human() {
        ui::info("State", &state.to_string());
        if violations.is_empty() && state == LinkState::Live {
            ui::success(&format!("{} is consistent", field.qualified_name()));
        } else {
            ui::warn(&format!("{} mirror violations", violations.len()));
            for violation in &violations {
                ui::violation(violation);
            }
        }
    }
    emit_success(mode, "check", json!({ "state": state, "violations": violations }))
}

pub fn run_refresh(store: &SqliteStore, mode: OutputMode, table: &str, column: &str) -> anyhow::Result<()> {
    let field = TableManager::open(store, table)?.get_field(column)?;
    if !field.is_link() {
        return Err(linkstore::Error::NotALinkField(field.qualified_name()).into());
    }

    let spinner = Spinner::new(&format!("Refreshing {}", field.qualified_name()));
    spinner.start();
    let rows = LinkFieldService::new(store).refresh_cache(&field)?;
    spinner.clear();

    if mode.is_human() {
        ui::success(&format!("Refreshed {} rows", rows));
    }
    emit_success(mode, "refresh", json!({ "rows": rows }))
}

pub fn run_stats(store: &SqliteStore, mode: OutputMode, database: &Path) -> anyhow::Result<()> {
    let stats = store.stats()?;
    if mode.is_human() {
        ui::header(&format!(
            "{} Linkstore Statistics ({})",
            Icons::STATS,
            database.display().style(ui::theme().dim.clone())
        ));
        println!("{}", ui::stats_table(&stats));
    }
    emit_success(mode, "stats", stats)
}
