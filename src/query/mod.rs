//! Query layer - deterministic ordering and pagination for caller SELECTs
//!
//! Callers hand over arbitrary SELECT text; the rewriter parses it, injects
//! the `_id` identifier where ordering or row identity is needed, and hands
//! back SQL the store can execute.

pub mod rewriter;

pub use rewriter::{
    extract_order_columns, has_order_by, rewrite_for_sorted_ids, rewrite_for_sorted_ids_compat,
    rewrite_with_explicit_order, rewrite_with_offset_limit,
};

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Sort direction of one ORDER BY item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            _ => Err(Error::Parse {
                sql: s.to_string(),
                message: format!("Unknown sort direction: {}", s),
            }),
        }
    }
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// One requested sort key, as sent by a view's sort editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSpec {
    pub column_id: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderSpec {
    pub fn new(column_id: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column_id: column_id.into(),
            direction,
        }
    }
}

impl FromStr for OrderSpec {
    type Err = Error;

    /// Parse `column` or `column:asc|desc`
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((column, direction)) => Ok(Self::new(column, direction.parse()?)),
            None => Ok(Self::new(s, SortDirection::Asc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_spec_parse() {
        assert_eq!(
            "age:desc".parse::<OrderSpec>().unwrap(),
            OrderSpec::new("age", SortDirection::Desc)
        );
        assert_eq!(
            "title".parse::<OrderSpec>().unwrap(),
            OrderSpec::new("title", SortDirection::Asc)
        );
        assert!("age:sideways".parse::<OrderSpec>().is_err());
    }

    #[test]
    fn test_order_spec_json() {
        let spec: OrderSpec = serde_json::from_str(r#"{"columnId":"age","direction":"DESC"}"#).unwrap();
        assert_eq!(spec, OrderSpec::new("age", SortDirection::Desc));

        let spec: OrderSpec = serde_json::from_str(r#"{"columnId":"age"}"#).unwrap();
        assert_eq!(spec.direction, SortDirection::Asc);
    }
}
