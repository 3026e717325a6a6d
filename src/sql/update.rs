//! UPDATE statement synthesis: by record identity (single or batched) and
//! by compiled filters.

use crate::error::{Result, StoreError};
use crate::model::Record;
use crate::prepare::PreparedModel;
use crate::sql::filter::{compile_filters, Filter, ParamCounter};
use crate::sql::sanitize::quote_identifier;
use crate::sql::{validate_fieldset, BuiltStatement};

/// Build `UPDATE ... SET ... WHERE <pk> = $n` for one record.
///
/// The primary key identifies the row and may not appear in the field-set.
pub fn build_update(
    model: &PreparedModel,
    record: &Record,
    fieldset: &[usize],
) -> Result<BuiltStatement> {
    validate_fieldset(model, fieldset)?;
    let descriptor = model.descriptor();
    let pk_column = model.primary_column()?;

    if fieldset.contains(&pk_column.field_index) {
        return Err(StoreError::fieldset(
            "primary key cannot appear in an update field-set",
        ));
    }

    let pk_value = record.primary_value(descriptor)?.clone();
    if pk_value.is_null() {
        return Err(StoreError::internal(format!(
            "updating '{}' requires a primary-key value",
            descriptor.name
        )));
    }

    let mut counter = ParamCounter::new();
    let mut values = Vec::with_capacity(fieldset.len() + 1);
    let assignments = build_assignments(model, record, fieldset, &mut counter, &mut values)?;

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        model.table().qualified(),
        assignments.join(", "),
        quote_identifier(&pk_column.name),
        counter.next()
    );
    values.push(pk_value);

    Ok(BuiltStatement { sql, values })
}

/// Build one UPDATE per record for records sharing a field-set, submitted
/// together as a batch. The placeholder counter resets per statement.
pub fn build_update_batch(
    model: &PreparedModel,
    records: &[Record],
    fieldset: &[usize],
) -> Result<Vec<BuiltStatement>> {
    if records.is_empty() {
        return Err(StoreError::NoRecords("update requires records".to_string()));
    }
    records
        .iter()
        .map(|record| build_update(model, record, fieldset))
        .collect()
}

/// Build `UPDATE ... SET ... WHERE <filters>` from one template record.
///
/// The SET clause binds first, then the filter values, off one counter.
pub fn build_update_where(
    model: &PreparedModel,
    template: &Record,
    fieldset: &[usize],
    filters: &[Filter],
) -> Result<BuiltStatement> {
    validate_fieldset(model, fieldset)?;
    let pk_column = model.primary_column()?;
    if fieldset.contains(&pk_column.field_index) {
        return Err(StoreError::fieldset(
            "primary key cannot appear in an update field-set",
        ));
    }

    let mut counter = ParamCounter::new();
    let mut values = Vec::with_capacity(fieldset.len());
    let assignments = build_assignments(model, template, fieldset, &mut counter, &mut values)?;

    let (clause, filter_values) = compile_filters(model, filters, &mut counter)?;
    values.extend(filter_values);

    let mut sql = format!(
        "UPDATE {} SET {}",
        model.table().qualified(),
        assignments.join(", ")
    );
    if !clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
    }

    Ok(BuiltStatement { sql, values })
}

fn build_assignments(
    model: &PreparedModel,
    record: &Record,
    fieldset: &[usize],
    counter: &mut ParamCounter,
    values: &mut Vec<crate::value::SqlValue>,
) -> Result<Vec<String>> {
    fieldset
        .iter()
        .map(|&field_index| {
            let column = model.table().column_for_field(field_index).ok_or_else(|| {
                StoreError::internal(format!("no column for field index {field_index}"))
            })?;
            values.push(record.get(field_index)?.clone());
            Ok(format!(
                "{} = ${}",
                quote_identifier(&column.name),
                counter.next()
            ))
        })
        .collect()
}
