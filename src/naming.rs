//! Physical name derivation
//!
//! Every table, column and index name that ends up interpolated into SQL text
//! is derived here, and every derived name is built from validated parts:
//! - relation tables: `lk_<owner>_<target>`
//! - index names: `idx__<table>__<column>`
//! - title shadow columns: `<column>__title`
//! - paired field names: `<target display name>_<5 base36 chars>`

use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;

use crate::{Error, Result};

/// Identifier column carried by every data table
pub const ID_COLUMN: &str = "_id";

/// Human readable label column carried by every data table
pub const TITLE_COLUMN: &str = "title";

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static IDENTIFIER: OnceLock<Regex> = OnceLock::new();

fn identifier_pattern() -> &'static Regex {
    IDENTIFIER.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern"))
}

/// Check that `name` is safe to interpolate into DDL/DML as a bare identifier.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if identifier_pattern().is_match(name) {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

/// Relation table owned by a link field living on `owner` and pointing at `target`.
pub fn relation_table_name(owner: &str, target: &str) -> Result<String> {
    Ok(format!("lk_{}_{}", validate_identifier(owner)?, validate_identifier(target)?))
}

/// Deterministic secondary index name for a single column.
pub fn index_name(table: &str, column: &str) -> Result<String> {
    Ok(format!("idx__{}__{}", validate_identifier(table)?, validate_identifier(column)?))
}

/// Shadow column holding the joined titles of a link column.
pub fn title_column(column: &str) -> Result<String> {
    Ok(format!("{}__title", validate_identifier(column)?))
}

/// Random lowercase base36 string of `len` characters.
pub fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Display name for the reverse side of a link.
///
/// Collisions are cosmetic only; the suffix keeps them rare in practice.
pub fn paired_field_name(target_display_name: &str) -> String {
    format!("{}_{}", target_display_name, random_base36(5))
}

/// Fresh physical column name for a new field.
pub fn generate_column_name() -> String {
    format!("cl_{}", random_base36(8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("tb_users").is_ok());
        assert!(validate_identifier("_id").is_ok());
        assert!(validate_identifier("Col9").is_ok());

        for bad in ["", "9col", "a-b", "a b", "t; DROP TABLE x", "name\"", "t.c"] {
            assert!(
                matches!(validate_identifier(bad), Err(Error::InvalidIdentifier(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_relation_table_names_mirror() {
        assert_eq!(relation_table_name("books", "authors").unwrap(), "lk_books_authors");
        assert_eq!(relation_table_name("authors", "books").unwrap(), "lk_authors_books");
        assert!(relation_table_name("books", "bad name").is_err());
    }

    #[test]
    fn test_index_and_title_names() {
        assert_eq!(index_name("books", "cl_abc").unwrap(), "idx__books__cl_abc");
        assert_eq!(title_column("cl_abc").unwrap(), "cl_abc__title");
    }

    #[test]
    fn test_paired_field_name_suffix() {
        let name = paired_field_name("Authors");
        let (prefix, suffix) = name.rsplit_once('_').unwrap();
        assert_eq!(prefix, "Authors");
        assert_eq!(suffix.len(), 5);
        assert!(suffix.bytes().all(|b| BASE36.contains(&b)));
    }

    #[test]
    fn test_generated_column_names_are_identifiers() {
        for _ in 0..32 {
            let column = generate_column_name();
            assert!(validate_identifier(&column).is_ok());
            assert_eq!(column.len(), 11);
        }
    }
}
