//! SQL synthesis: identifier hygiene, DDL text, the filter compiler, and the
//! CRUD statement builders.
//!
//! Everything in this module produces SQL text plus ordered values and never
//! touches a connection; execution lives in the store.

pub mod ddl;
pub mod delete;
pub mod filter;
pub mod insert;
pub mod sanitize;
pub mod select;
pub mod update;

use crate::error::{Result, StoreError};
use crate::prepare::PreparedModel;
use crate::value::SqlValue;

pub use filter::{compile_filters, Filter, FilterOperator, ParamCounter};
pub use sanitize::{qualify, quote_identifier, validate_identifier};

/// One ready-to-execute statement: SQL text and its ordered bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Validate a field-set against a prepared model: non-empty, no duplicates,
/// every entry a database-backed field.
pub(crate) fn validate_fieldset(model: &PreparedModel, fieldset: &[usize]) -> Result<()> {
    if fieldset.is_empty() {
        return Err(StoreError::fieldset("field-set is empty"));
    }

    let descriptor = model.descriptor();
    for (position, &index) in fieldset.iter().enumerate() {
        let field = descriptor.fields.get(index).ok_or_else(|| {
            StoreError::fieldset(format!(
                "field index {index} is out of range for model '{}'",
                descriptor.name
            ))
        })?;
        if model.table().column_for_field(index).is_none() {
            return Err(StoreError::fieldset(format!(
                "field '{}' on model '{}' has no database column",
                field.name, descriptor.name
            )));
        }
        if fieldset[..position].contains(&index) {
            return Err(StoreError::fieldset(format!(
                "field '{}' appears twice in the field-set",
                field.name
            )));
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_fieldset() {
        let model = testutil::prepared_model();

        assert!(validate_fieldset(&model, &[0, 1, 2]).is_ok());
        assert!(matches!(
            validate_fieldset(&model, &[]),
            Err(StoreError::Fieldset(_))
        ));
        assert!(matches!(
            validate_fieldset(&model, &[0, 0]),
            Err(StoreError::Fieldset(_))
        ));
        assert!(matches!(
            validate_fieldset(&model, &[9]),
            Err(StoreError::Fieldset(_))
        ));
        // Relationship fields have no column.
        assert!(matches!(
            validate_fieldset(&model, &[3]),
            Err(StoreError::Fieldset(_))
        ));
    }
}
