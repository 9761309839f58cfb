//! Link fields - bidirectional many-to-many relations between data tables
//!
//! A link field on table `A` (column `c`) pointing at table `B` is always
//! paired with a reverse field on `B` (column `d`). Membership lives in two
//! relation tables:
//! - `lk_A_B(self, ref, link_field_id = c)`
//! - `lk_B_A(self, ref, link_field_id = d)`
//!
//! Every forward row `(a, b, c)` is mirrored by `(b, a, d)`. Both link
//! columns additionally cache the joined ids and a `__title` shadow column
//! with the joined titles of the referenced rows.

pub mod diff;
pub mod service;

pub use diff::{compute_diff, split_ids, LinkDiff};
pub use service::{ClosureViolation, LinkFieldService};

use serde::Serialize;

use crate::field::{Field, LinkProperty};
use crate::naming;
use crate::Result;

/// Lifecycle of a link field pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Descriptor exists, physical schema is missing or partial
    Declared,
    /// Columns and relation tables exist, pairing not closed yet
    SchemaProvisioned,
    /// Schema complete and both descriptors point at each other
    Live,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LinkState::Declared => "declared",
            LinkState::SchemaProvisioned => "schema_provisioned",
            LinkState::Live => "live",
        };
        write!(f, "{}", s)
    }
}

/// One direction of a link, with every name validated for interpolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSide {
    pub table: String,
    pub column: String,
    pub linked_table: String,
    pub linked_column: String,
}

impl LinkSide {
    pub fn from_field(field: &Field) -> Result<Self> {
        let property = field.link_property()?;
        Ok(Self {
            table: naming::validate_identifier(&field.table_name)?.to_string(),
            column: naming::validate_identifier(&field.table_column_name)?.to_string(),
            linked_table: naming::validate_identifier(&property.link_table_name)?.to_string(),
            linked_column: naming::validate_identifier(&property.link_column_name)?.to_string(),
        })
    }

    /// The same link seen from the other table
    pub fn paired(&self) -> Self {
        Self {
            table: self.linked_table.clone(),
            column: self.linked_column.clone(),
            linked_table: self.table.clone(),
            linked_column: self.column.clone(),
        }
    }

    /// `lk_<table>_<linked_table>`
    pub fn relation_table(&self) -> Result<String> {
        naming::relation_table_name(&self.table, &self.linked_table)
    }

    /// `lk_<linked_table>_<table>`
    pub fn reverse_relation_table(&self) -> Result<String> {
        naming::relation_table_name(&self.linked_table, &self.table)
    }

    /// `<column>__title`
    pub fn title_column(&self) -> Result<String> {
        naming::title_column(&self.column)
    }
}

/// Build the reverse descriptor of a link field.
///
/// Table and column come from the original's property; the new property
/// points back at the original. The display name is the target table's
/// display name plus a random base36 suffix.
pub fn derive_paired_field(field: &Field, target_display_name: &str) -> Result<Field> {
    let property = field.link_property()?;
    Field::link(
        naming::paired_field_name(target_display_name),
        property.link_table_name,
        property.link_column_name,
        LinkProperty::new(field.table_name.clone(), field.table_column_name.clone()),
    )
}
