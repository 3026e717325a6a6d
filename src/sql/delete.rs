//! DELETE statement synthesis.
//!
//! Filters are mandatory so a malformed scope can never become a full-table
//! delete; deleting explicit records synthesizes a `pk IN (...)` filter from
//! their primary-key values.

use crate::error::{Result, StoreError};
use crate::model::Record;
use crate::prepare::PreparedModel;
use crate::sql::filter::{compile_filters, Filter, FilterOperator, ParamCounter};
use crate::sql::BuiltStatement;
use crate::value::SqlValue;

/// Build `DELETE FROM ... WHERE <compiled filters>`.
pub fn build_delete(model: &PreparedModel, filters: &[Filter]) -> Result<BuiltStatement> {
    if filters.is_empty() {
        return Err(StoreError::filter("delete requires at least one filter"));
    }

    let mut counter = ParamCounter::new();
    let (clause, values) = compile_filters(model, filters, &mut counter)?;
    if clause.is_empty() {
        return Err(StoreError::filter(
            "delete filters compiled to no conditions",
        ));
    }

    Ok(BuiltStatement {
        sql: format!("DELETE FROM {} WHERE {}", model.table().qualified(), clause),
        values,
    })
}

/// Build a DELETE targeting explicit records by primary key.
pub fn build_delete_records(
    model: &PreparedModel,
    records: &[Record],
) -> Result<BuiltStatement> {
    if records.is_empty() {
        return Err(StoreError::NoRecords("delete requires records".to_string()));
    }

    let descriptor = model.descriptor();
    let pk_values: Vec<SqlValue> = records
        .iter()
        .map(|record| {
            let value = record.primary_value(descriptor)?;
            if value.is_null() {
                return Err(StoreError::internal(format!(
                    "deleting '{}' requires a primary-key value",
                    descriptor.name
                )));
            }
            Ok(value.clone())
        })
        .collect::<Result<_>>()?;

    let pk_field = &descriptor.fields[model.primary_column()?.field_index];
    let filter = Filter::new(pk_field.name.clone(), FilterOperator::In, pk_values);
    build_delete(model, &[filter])
}
