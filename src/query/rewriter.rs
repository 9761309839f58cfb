//! SELECT rewriting
//!
//! Every entry point parses strictly: input that is not exactly one SELECT
//! statement fails with `Error::Parse` instead of being passed through.

use std::sync::OnceLock;

use regex::Regex;
use sqlparser::ast::{
    CastKind, DataType, Expr, Ident, OrderBy, OrderByExpr, Query, SelectItem, SetExpr, Statement,
};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::{Parser, ParserError};

use crate::field::FieldType;
use crate::naming::{self, ID_COLUMN};
use crate::query::{OrderSpec, SortDirection};
use crate::{Error, Result};

static CAST_SUFFIX: OnceLock<Regex> = OnceLock::new();

/// `expr::REAL` as printed by the generic serializer; SQLite only knows `CAST(expr AS REAL)`
fn cast_suffix_pattern() -> &'static Regex {
    CAST_SUFFIX.get_or_init(|| {
        Regex::new(r#"(?P<expr>[A-Za-z0-9_."`\[\]]+)::(?P<ty>REAL|DOUBLE|NUMERIC|INTEGER)\b"#)
            .expect("static pattern")
    })
}

fn parse_error(sql: &str, err: ParserError) -> Error {
    Error::Parse {
        sql: sql.to_string(),
        message: err.to_string(),
    }
}

/// Parse text that must hold exactly one SELECT statement
fn parse_query(sql: &str) -> Result<Box<Query>> {
    let mut statements = Parser::parse_sql(&SQLiteDialect {}, sql).map_err(|e| parse_error(sql, e))?;
    if statements.len() != 1 {
        return Err(Error::Parse {
            sql: sql.to_string(),
            message: format!("expected a single SELECT statement, found {}", statements.len()),
        });
    }
    match statements.remove(0) {
        Statement::Query(query) if matches!(query.body.as_ref(), SetExpr::Select(_)) => Ok(query),
        Statement::Query(query) => Err(Error::Parse {
            sql: sql.to_string(),
            message: format!("expected a plain SELECT, found `{}`", query.body),
        }),
        other => Err(Error::Parse {
            sql: sql.to_string(),
            message: format!("expected a SELECT statement, found `{}`", other),
        }),
    }
}

/// Projection of a plain SELECT body; set operations have no single projection
fn projection_mut<'q>(sql: &str, query: &'q mut Query) -> Result<&'q mut Vec<SelectItem>> {
    match query.body.as_mut() {
        SetExpr::Select(select) => Ok(&mut select.projection),
        _ => Err(Error::Parse {
            sql: sql.to_string(),
            message: "expected a plain SELECT, not a set operation".to_string(),
        }),
    }
}

/// One ORDER BY item over a bare column
fn order_item(column: &str, direction: SortDirection) -> Result<OrderByExpr> {
    let text = format!("{} {}", naming::validate_identifier(column)?, direction.as_sql());
    Parser::new(&SQLiteDialect {})
        .try_with_sql(&text)
        .and_then(|mut parser| parser.parse_order_by_expr())
        .map_err(|e| parse_error(&text, e))
}

/// Order a text-stored column numerically. The serializer prints the AST
/// cast as `col::REAL`, so the single item is normalized and re-parsed.
fn numeric_order_item(item: OrderByExpr) -> Result<OrderByExpr> {
    let cast = OrderByExpr {
        expr: Expr::Cast {
            kind: CastKind::DoubleColon,
            expr: Box::new(item.expr),
            data_type: DataType::Real,
            format: None,
        },
        ..item
    };
    let text = normalize_casts(&cast.to_string());
    Parser::new(&SQLiteDialect {})
        .try_with_sql(&text)
        .and_then(|mut parser| parser.parse_order_by_expr())
        .map_err(|e| parse_error(&text, e))
}

fn default_order_by() -> Result<OrderBy> {
    Ok(OrderBy {
        exprs: vec![order_item(ID_COLUMN, SortDirection::Asc)?],
        interpolate: None,
    })
}

fn id_column() -> Expr {
    Expr::Identifier(Ident::new(ID_COLUMN))
}

/// `*` becomes `_id`, `t.*` becomes `t._id`
fn replace_wildcards(projection: &mut [SelectItem]) {
    for item in projection.iter_mut() {
        match item {
            SelectItem::Wildcard(_) => *item = SelectItem::UnnamedExpr(id_column()),
            SelectItem::QualifiedWildcard(table, _) => {
                let mut parts = table.0.clone();
                parts.push(Ident::new(ID_COLUMN));
                *item = SelectItem::UnnamedExpr(Expr::CompoundIdentifier(parts));
            }
            _ => {}
        }
    }
}

fn column_of(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(ident) => ident.value.clone(),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|ident| ident.value.clone())
            .unwrap_or_default(),
        Expr::Nested(inner) => column_of(inner),
        Expr::Cast { expr, .. } => column_of(expr),
        other => other.to_string(),
    }
}

/// Column references of the ORDER BY clause, in clause order.
pub fn extract_order_columns(sql: &str) -> Result<Vec<String>> {
    let query = parse_query(sql)?;
    Ok(query
        .order_by
        .as_ref()
        .map(|order_by| order_by.exprs.iter().map(|item| column_of(&item.expr)).collect())
        .unwrap_or_default())
}

/// Rewrite a query to fetch row identifiers in display order.
///
/// Wildcards shrink to `_id`. The default `ORDER BY _id ASC` is injected only
/// when no ORDER BY exists and the caller is not sorting through a temp table.
pub fn rewrite_for_sorted_ids(sql: &str, use_temp_table: bool) -> Result<String> {
    let mut query = parse_query(sql)?;
    replace_wildcards(projection_mut(sql, &mut query)?);
    if !use_temp_table && query.order_by.is_none() {
        query.order_by = Some(default_order_by()?);
    }
    Ok(query.to_string())
}

/// Like [`rewrite_for_sorted_ids`], but always injects the default ordering
/// when the query has none.
pub fn rewrite_for_sorted_ids_compat(sql: &str) -> Result<String> {
    let mut query = parse_query(sql)?;
    replace_wildcards(projection_mut(sql, &mut query)?);
    if query.order_by.is_none() {
        query.order_by = Some(default_order_by()?);
    }
    Ok(query.to_string())
}

/// Add `_id` to the projection, guarantee an ordering and page the result.
///
/// Any LIMIT/OFFSET already on the query is replaced by the requested page.
pub fn rewrite_with_offset_limit(sql: &str, offset: u64, limit: u64) -> Result<String> {
    let mut query = parse_query(sql)?;
    projection_mut(sql, &mut query)?.push(SelectItem::UnnamedExpr(id_column()));
    if query.order_by.is_none() {
        query.order_by = Some(default_order_by()?);
    }
    query.limit = None;
    query.offset = None;
    Ok(format!("{} LIMIT {} OFFSET {}", query, limit, offset))
}

/// Whether the query carries an ORDER BY. Absent or blank input is `false`.
pub fn has_order_by(sql: Option<&str>) -> Result<bool> {
    match sql {
        Some(sql) if !sql.trim().is_empty() => Ok(parse_query(sql)?.order_by.is_some()),
        _ => Ok(false),
    }
}

/// Replace the query's ordering with `order_specs`.
///
/// Numeric fields are stored as text, so they are ordered through a REAL
/// cast; otherwise "10" sorts before "2". An empty `order_specs` removes the
/// ORDER BY entirely.
pub fn rewrite_with_explicit_order<F>(order_specs: &[OrderSpec], sql: &str, field_type_of: F) -> Result<String>
where
    F: Fn(&str) -> Option<FieldType>,
{
    let mut query = parse_query(sql)?;

    if order_specs.is_empty() {
        query.order_by = None;
    } else {
        let mut exprs = Vec::with_capacity(order_specs.len());
        for spec in order_specs {
            let item = order_item(&spec.column_id, spec.direction)?;
            if field_type_of(&spec.column_id).is_some_and(|t| t.is_numeric()) {
                exprs.push(numeric_order_item(item)?);
            } else {
                exprs.push(item);
            }
        }
        query.order_by = Some(OrderBy {
            exprs,
            interpolate: None,
        });
    }

    Ok(query.to_string())
}

/// Textual post-pass turning `expr::TYPE` into SQLite's `CAST(expr AS TYPE)`.
/// Only meant for rendered ORDER BY items; it does not skip string literals.
pub fn normalize_casts(sql: &str) -> String {
    cast_suffix_pattern()
        .replace_all(sql, "CAST($expr AS $ty)")
        .into_owned()
}
