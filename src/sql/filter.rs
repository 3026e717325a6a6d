//! Filter-to-SQL compilation.
//!
//! Each filter names a field, an operator and zero or more values; the
//! compiler turns it into SQL fragments with strictly positional `$N`
//! placeholders drawn from an explicit per-statement [`ParamCounter`].

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::prepare::PreparedModel;
use crate::sql::sanitize::quote_identifier;
use crate::table::Column;
use crate::value::SqlValue;

/// Supported filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    In,
    NotIn,
    IsNull,
    NotNull,
    Contains,
    StartsWith,
    EndsWith,
}

impl FilterOperator {
    /// The raw SQL token this operator compiles to.
    pub fn token(self) -> &'static str {
        match self {
            FilterOperator::Equal => "=",
            FilterOperator::NotEqual => "<>",
            FilterOperator::GreaterThan => ">",
            FilterOperator::GreaterOrEqual => ">=",
            FilterOperator::LessThan => "<",
            FilterOperator::LessOrEqual => "<=",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT IN",
            FilterOperator::IsNull => "IS NULL",
            FilterOperator::NotNull => "IS NOT NULL",
            FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith => {
                "LIKE"
            }
        }
    }

    /// Comparison operators usable in range filters.
    pub fn is_rangeable(self) -> bool {
        matches!(
            self,
            FilterOperator::GreaterThan
                | FilterOperator::GreaterOrEqual
                | FilterOperator::LessThan
                | FilterOperator::LessOrEqual
        )
    }

    /// Operators that only accept text values.
    pub fn is_string_only(self) -> bool {
        matches!(
            self,
            FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith
        )
    }
}

/// A field + operator + values triple compiled into a WHERE fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub values: Vec<SqlValue>,
}

impl Filter {
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        values: Vec<SqlValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            values,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::new(field, FilterOperator::Equal, vec![value.into()])
    }

    pub fn ne(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::new(field, FilterOperator::NotEqual, vec![value.into()])
    }

    pub fn in_values(field: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self::new(field, FilterOperator::In, values)
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNull, Vec::new())
    }
}

/// Monotonic `$N` placeholder counter, owned by one statement.
///
/// Reset at every statement boundary, including each statement of a batch,
/// so values bind positionally regardless of how many filters or field
/// assignments precede them.
#[derive(Debug)]
pub struct ParamCounter {
    next: usize,
}

impl ParamCounter {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Take the next placeholder number.
    pub fn next(&mut self) -> usize {
        let current = self.next;
        self.next += 1;
        current
    }
}

impl Default for ParamCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// One compiled WHERE fragment and the values it binds.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Compile one filter against its column into zero or more fragments.
pub fn compile_filter(
    column: &Column,
    filter: &Filter,
    counter: &mut ParamCounter,
) -> Result<Vec<Fragment>> {
    let col = quote_identifier(&column.name);
    let op = filter.operator;

    match op {
        FilterOperator::IsNull | FilterOperator::NotNull => {
            if !filter.values.is_empty() {
                return Err(StoreError::filter(format!(
                    "operator {} takes no values, got {}",
                    op.token(),
                    filter.values.len()
                )));
            }
            Ok(vec![Fragment {
                sql: format!("{col} {}", op.token()),
                values: Vec::new(),
            }])
        }
        FilterOperator::In | FilterOperator::NotIn => {
            // An empty value list is a no-op filter, not a syntax error.
            if filter.values.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders: Vec<String> = filter
                .values
                .iter()
                .map(|_| format!("${}", counter.next()))
                .collect();
            Ok(vec![Fragment {
                sql: format!("{col} {} ({})", op.token(), placeholders.join(",")),
                values: filter.values.clone(),
            }])
        }
        FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith => {
            if filter.values.is_empty() {
                return Err(StoreError::filter(format!(
                    "operator {op:?} requires at least one value"
                )));
            }
            filter
                .values
                .iter()
                .map(|value| {
                    let SqlValue::Text(text) = value else {
                        return Err(StoreError::filter(format!(
                            "operator {op:?} on '{}' requires text values",
                            filter.field
                        )));
                    };
                    let pattern = match op {
                        FilterOperator::Contains => format!("%{text}%"),
                        FilterOperator::StartsWith => format!("{text}%"),
                        _ => format!("%{text}"),
                    };
                    Ok(Fragment {
                        sql: format!("{col} LIKE ${}", counter.next()),
                        values: vec![SqlValue::Text(pattern)],
                    })
                })
                .collect()
        }
        _ => {
            if filter.values.is_empty() {
                return Err(StoreError::filter(format!(
                    "operator {} requires at least one value",
                    op.token()
                )));
            }
            filter
                .values
                .iter()
                .map(|value| {
                    // NULL values compile to IS [NOT] NULL for (in)equality.
                    if value.is_null() {
                        let token = match op {
                            FilterOperator::Equal => "IS NULL",
                            FilterOperator::NotEqual => "IS NOT NULL",
                            _ => {
                                return Err(StoreError::filter(format!(
                                    "operator {} does not accept NULL",
                                    op.token()
                                )));
                            }
                        };
                        return Ok(Fragment {
                            sql: format!("{col} {token}"),
                            values: Vec::new(),
                        });
                    }
                    Ok(Fragment {
                        sql: format!("{col} {} ${}", op.token(), counter.next()),
                        values: vec![value.clone()],
                    })
                })
                .collect()
        }
    }
}

/// Compile a filter list into one `AND`-joined WHERE clause body.
///
/// Returns the clause (empty when no fragments were produced) and the bound
/// values in placeholder order.
pub fn compile_filters(
    model: &PreparedModel,
    filters: &[Filter],
    counter: &mut ParamCounter,
) -> Result<(String, Vec<SqlValue>)> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    for filter in filters {
        let column = resolve_filter_column(model, filter)?;
        for fragment in compile_filter(column, filter, counter)? {
            clauses.push(fragment.sql);
            values.extend(fragment.values);
        }
    }

    Ok((clauses.join(" AND "), values))
}

fn resolve_filter_column<'a>(model: &'a PreparedModel, filter: &Filter) -> Result<&'a Column> {
    let descriptor = model.descriptor();
    let index = descriptor.field_index(&filter.field).ok_or_else(|| {
        StoreError::filter(format!(
            "unknown field '{}' on model '{}'",
            filter.field, descriptor.name
        ))
    })?;

    let field = &descriptor.fields[index];
    if field.kind.is_relationship() {
        // Nested-relationship filtering is a join-strategy problem this
        // compiler does not take on; fail loudly instead of emitting a
        // fragment that cannot match.
        return Err(StoreError::filter(format!(
            "field '{}' on model '{}' is a relationship and cannot be filtered directly",
            filter.field, descriptor.name
        )));
    }

    model.table().column_for_field(index).ok_or_else(|| {
        StoreError::filter(format!(
            "field '{}' on model '{}' has no database column",
            filter.field, descriptor.name
        ))
    })
}
