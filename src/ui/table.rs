use std::collections::HashMap;

use tabled::{builder::Builder, settings::Style, Table, Tabled};

use crate::field::Field;
use crate::storage::sqlite::value_to_text;
use crate::storage::{DbStats, Record};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: impl ToString) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &DbStats) -> String {
    let mut builder = TableBuilder::new();
    builder.add_row("Tables", stats.tables);
    builder.add_row("Fields", stats.fields);
    builder.add_row("Link fields", stats.link_fields);
    builder.add_row("Relation tables", stats.relation_tables);
    builder.add_row("Relation rows", stats.relation_rows);
    builder.add_row("Indexes", stats.indexes);
    builder.build()
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Column")]
    column: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    field_type: String,
    #[tabled(rename = "Links to")]
    target: String,
}

pub fn fields_table(fields: &[Field]) -> String {
    let rows: Vec<FieldRow> = fields
        .iter()
        .map(|field| FieldRow {
            column: field.table_column_name.clone(),
            name: field.name.clone(),
            field_type: field.field_type.to_string(),
            target: field
                .link_property()
                .map(|p| format!("{}.{}", p.link_table_name, p.link_column_name))
                .unwrap_or_default(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Grid of records; headers use field display names where known
pub fn records_table(records: &[Record], display_names: &HashMap<String, String>) -> String {
    let Some(first) = records.first() else {
        return String::new();
    };

    let mut builder = Builder::default();
    builder.push_record(first.columns().iter().map(|column| {
        display_names
            .get(column)
            .cloned()
            .unwrap_or_else(|| column.clone())
    }));
    for record in records {
        builder.push_record(
            record
                .values()
                .iter()
                .map(|value| value_to_text(value).unwrap_or_default()),
        );
    }
    builder.build().with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;

    #[test]
    fn test_records_table_uses_display_names() {
        let store = SqliteStore::open_in_memory().unwrap();
        let records = store
            .query_rows("SELECT 'r1' AS _id, 'Dune' AS cl_x, NULL AS cl_y", [])
            .unwrap();
        let names = HashMap::from([("cl_x".to_string(), "Name".to_string())]);

        let rendered = records_table(&records, &names);
        assert!(rendered.contains("Name"));
        assert!(rendered.contains("cl_y"));
        assert!(rendered.contains("Dune"));
        assert!(records_table(&[], &names).is_empty());
    }

    #[test]
    fn test_empty_builder() {
        assert!(TableBuilder::new().build().is_empty());
    }
}
