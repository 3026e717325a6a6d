//! INSERT statement synthesis: shared field-set and heterogeneous bulk
//! field-set variants.

use crate::error::{Result, StoreError};
use crate::model::Record;
use crate::prepare::PreparedModel;
use crate::sql::filter::ParamCounter;
use crate::sql::sanitize::quote_identifier;
use crate::sql::validate_fieldset;
use crate::value::SqlValue;

/// One INSERT covering a subset of the scope's records.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
    /// Original scope indices of the records this statement covers, in the
    /// order their value tuples (and any RETURNING rows) appear.
    pub record_indices: Vec<usize>,
    /// Whether the statement ends in `RETURNING <pk>` and yields one row per
    /// covered record.
    pub returning_pk: bool,
}

/// Build one multi-row INSERT for records sharing a field-set.
///
/// The primary key is omitted from the column list unless explicitly
/// selected; its omission adds a `RETURNING <pk>` clause so generated keys
/// can be scanned back. With `fill_not_null`, unselected NOT NULL columns are
/// appended with their zero value instead of being omitted.
pub fn build_insert(
    model: &PreparedModel,
    records: &[Record],
    record_indices: &[usize],
    fieldset: &[usize],
    fill_not_null: bool,
) -> Result<InsertStatement> {
    if record_indices.is_empty() {
        return Err(StoreError::NoRecords("insert requires records".to_string()));
    }
    validate_fieldset(model, fieldset)?;

    let descriptor = model.descriptor();
    let table = model.table();
    let pk_index = descriptor.primary().map(|(index, _)| index);
    let pk_selected = pk_index.is_some_and(|index| fieldset.contains(&index));

    // Selected fields first, then auto-filled NOT NULL columns in
    // declaration order.
    let mut field_indices: Vec<usize> = fieldset.to_vec();
    let mut filled: Vec<usize> = Vec::new();
    if fill_not_null {
        for column in &table.columns {
            if column.has_not_null()
                && !column.is_primary()
                && !fieldset.contains(&column.field_index)
            {
                field_indices.push(column.field_index);
                filled.push(column.field_index);
            }
        }
    }

    let columns: Vec<&crate::table::Column> = field_indices
        .iter()
        .map(|&index| {
            table.column_for_field(index).ok_or_else(|| {
                StoreError::internal(format!("no column for field index {index}"))
            })
        })
        .collect::<Result<_>>()?;

    let column_list: Vec<String> = columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect();

    let mut counter = ParamCounter::new();
    let mut tuples = Vec::with_capacity(record_indices.len());
    let mut values = Vec::with_capacity(record_indices.len() * field_indices.len());

    for &record_index in record_indices {
        let record = records.get(record_index).ok_or_else(|| {
            StoreError::internal(format!("no record at scope index {record_index}"))
        })?;
        let placeholders: Vec<String> = field_indices
            .iter()
            .map(|&field_index| {
                let value = if filled.contains(&field_index) {
                    descriptor.fields[field_index].value_type.zero()
                } else {
                    record.get(field_index)?.clone()
                };
                values.push(value);
                Ok(format!("${}", counter.next()))
            })
            .collect::<Result<_>>()?;
        tuples.push(format!("({})", placeholders.join(",")));
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        table.qualified(),
        column_list.join(", "),
        tuples.join(",")
    );

    let returning_pk = !pk_selected && pk_index.is_some();
    if returning_pk {
        sql.push_str(&format!(
            " RETURNING {}",
            quote_identifier(&model.primary_column()?.name)
        ));
    }

    Ok(InsertStatement {
        sql,
        values,
        record_indices: record_indices.to_vec(),
        returning_pk,
    })
}

/// Build one INSERT per distinct field-set for records with heterogeneous
/// field-sets, keyed back to the original record indices.
pub fn build_insert_bulk(
    model: &PreparedModel,
    records: &[Record],
    fieldsets: &[Vec<usize>],
    fill_not_null: bool,
) -> Result<Vec<InsertStatement>> {
    if records.is_empty() {
        return Err(StoreError::NoRecords("insert requires records".to_string()));
    }
    if fieldsets.len() != records.len() {
        return Err(StoreError::fieldset(format!(
            "bulk insert requires one field-set per record: {} field-sets for {} records",
            fieldsets.len(),
            records.len()
        )));
    }

    // Group record indices by field-set, preserving first-seen order.
    let mut groups: Vec<(&Vec<usize>, Vec<usize>)> = Vec::new();
    for (record_index, fieldset) in fieldsets.iter().enumerate() {
        match groups.iter_mut().find(|(fs, _)| *fs == fieldset) {
            Some((_, indices)) => indices.push(record_index),
            None => groups.push((fieldset, vec![record_index])),
        }
    }

    groups
        .into_iter()
        .map(|(fieldset, indices)| {
            build_insert(model, records, &indices, fieldset, fill_not_null)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::testutil::prepared_model;

    fn records(n: usize) -> Vec<Record> {
        let model = prepared_model();
        (0..n)
            .map(|i| {
                let mut record = Record::zeroed(model.descriptor());
                record
                    .set(1, SqlValue::Text(format!("sku-{i}")))
                    .unwrap();
                record
            })
            .collect()
    }

    #[test]
    fn test_single_record_insert_with_returning() {
        let model = prepared_model();
        let records = records(1);
        let stmt = build_insert(&model, &records, &[0], &[1, 2], true).unwrap();

        assert_eq!(
            stmt.sql,
            "INSERT INTO \"public\".\"models\" (\"attr_string\", \"attr_flag\") \
             VALUES ($1,$2) RETURNING \"id\""
        );
        assert!(stmt.returning_pk);
        assert_eq!(stmt.values.len(), 2);
        assert_eq!(stmt.values[0], SqlValue::Text("sku-0".to_string()));
    }

    #[test]
    fn test_multi_record_insert_has_one_tuple_per_record() {
        let model = prepared_model();
        let records = records(3);
        let stmt =
            build_insert(&model, &records, &[0, 1, 2], &[1], true).unwrap();

        assert_eq!(
            stmt.sql,
            "INSERT INTO \"public\".\"models\" (\"attr_string\") \
             VALUES ($1),($2),($3) RETURNING \"id\""
        );
        assert_eq!(stmt.values.len(), 3);
        assert_eq!(stmt.record_indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_selected_pk_suppresses_returning() {
        let model = prepared_model();
        let records = records(1);
        let stmt = build_insert(&model, &records, &[0], &[0, 1], true).unwrap();

        assert!(!stmt.returning_pk);
        assert!(stmt.sql.starts_with(
            "INSERT INTO \"public\".\"models\" (\"id\", \"attr_string\") VALUES ($1,$2)"
        ));
        assert!(!stmt.sql.contains("RETURNING"));
    }

    #[test]
    fn test_fill_not_null_appends_zero_value() {
        let model = prepared_model();
        let records = records(1);
        // attr_string is NOT NULL and unselected; fill policy adds it.
        let stmt = build_insert(&model, &records, &[0], &[2], true).unwrap();

        assert!(stmt.sql.contains("(\"attr_flag\", \"attr_string\")"));
        assert_eq!(stmt.values[1], SqlValue::Text(String::new()));

        // Policy off: the column is simply omitted.
        let stmt = build_insert(&model, &records, &[0], &[2], false).unwrap();
        assert!(!stmt.sql.contains("attr_string"));
    }

    #[test]
    fn test_empty_records_rejected() {
        let model = prepared_model();
        let records = records(1);
        assert!(matches!(
            build_insert(&model, &records, &[], &[1], true),
            Err(StoreError::NoRecords(_))
        ));
    }

    #[test]
    fn test_bulk_insert_one_statement_per_distinct_fieldset() {
        let model = prepared_model();
        let records = records(4);
        let fieldsets = vec![vec![1], vec![1, 2], vec![1], vec![1, 2]];
        let statements = build_insert_bulk(&model, &records, &fieldsets, false).unwrap();

        assert_eq!(statements.len(), 2);
        // Records are keyed back to their original scope indices.
        assert_eq!(statements[0].record_indices, vec![0, 2]);
        assert_eq!(statements[1].record_indices, vec![1, 3]);
        assert!(statements[0].sql.contains("VALUES ($1),($2)"));
        assert!(statements[1].sql.contains("VALUES ($1,$2),($3,$4)"));
    }

    #[test]
    fn test_bulk_insert_fieldset_count_mismatch() {
        let model = prepared_model();
        let records = records(2);
        assert!(matches!(
            build_insert_bulk(&model, &records, &[vec![1]], false),
            Err(StoreError::Fieldset(_))
        ));
    }
}
