//! SELECT synthesis: find (projection, filters, sorting, pagination) and
//! count.
//!
//! Bound values follow clause order exactly: filters first, then limit, then
//! offset, all numbered by one per-statement counter.

use crate::error::{Result, StoreError};
use crate::prepare::PreparedModel;
use crate::scope::{Pagination, Sort};
use crate::sql::filter::{compile_filters, Filter, ParamCounter};
use crate::sql::sanitize::quote_identifier;
use crate::sql::{validate_fieldset, BuiltStatement};
use crate::value::SqlValue;

/// A built SELECT plus the field indices its result columns decode into.
#[derive(Debug, Clone, PartialEq)]
pub struct FindStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
    /// Field declaration indices in result-column order.
    pub projection: Vec<usize>,
}

/// Build a find statement.
///
/// The field-set determines the projected columns, defaulting to every
/// non-relationship column in declaration order.
pub fn build_find(
    model: &PreparedModel,
    fieldset: Option<&[usize]>,
    filters: &[Filter],
    sort: &[Sort],
    pagination: Option<Pagination>,
) -> Result<FindStatement> {
    let table = model.table();

    let projection: Vec<usize> = match fieldset {
        Some(fields) => {
            validate_fieldset(model, fields)?;
            fields.to_vec()
        }
        None => table.columns.iter().map(|c| c.field_index).collect(),
    };

    let column_list: Vec<String> = projection
        .iter()
        .map(|&index| {
            table.column_for_field(index).map(|c| quote_identifier(&c.name)).ok_or_else(
                || StoreError::internal(format!("no column for field index {index}")),
            )
        })
        .collect::<Result<_>>()?;

    let mut counter = ParamCounter::new();
    let (clause, mut values) = compile_filters(model, filters, &mut counter)?;

    let mut sql = format!(
        "SELECT {} FROM {}",
        column_list.join(", "),
        table.qualified()
    );
    if !clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }

    if !sort.is_empty() {
        let order_parts: Vec<String> = sort
            .iter()
            .map(|entry| {
                let index = model
                    .descriptor()
                    .field_index(&entry.field)
                    .ok_or_else(|| {
                        StoreError::filter(format!("unknown sort field '{}'", entry.field))
                    })?;
                let column = table.column_for_field(index).ok_or_else(|| {
                    StoreError::filter(format!(
                        "sort field '{}' has no database column",
                        entry.field
                    ))
                })?;
                Ok(format!(
                    "{} {}",
                    quote_identifier(&column.name),
                    entry.direction.sql()
                ))
            })
            .collect::<Result<_>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_parts.join(", "));
    }

    if let Some(page) = pagination {
        sql.push_str(&format!(" LIMIT ${}", counter.next()));
        values.push(SqlValue::BigInt(page.limit));
        sql.push_str(&format!(" OFFSET ${}", counter.next()));
        values.push(SqlValue::BigInt(page.offset));
    }

    Ok(FindStatement {
        sql,
        values,
        projection,
    })
}

/// Build `SELECT COUNT(DISTINCT <pk>) FROM ... [WHERE ...]`.
pub fn build_count(model: &PreparedModel, filters: &[Filter]) -> Result<BuiltStatement> {
    let pk = model.primary_column()?;

    let mut counter = ParamCounter::new();
    let (clause, values) = compile_filters(model, filters, &mut counter)?;

    let mut sql = format!(
        "SELECT COUNT(DISTINCT {}) FROM {}",
        quote_identifier(&pk.name),
        model.table().qualified()
    );
    if !clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }

    Ok(BuiltStatement { sql, values })
}
