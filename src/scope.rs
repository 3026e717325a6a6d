//! Query descriptors: the full description of one CRUD operation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Record;
use crate::sql::filter::Filter;

fn default_limit() -> i64 {
    100
}

/// Page window compiled to `LIMIT $n OFFSET $n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One ORDER BY entry, validated against the prepared table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Description of one operation: target model, records to write, field-sets,
/// filters, pagination, sorting and an optional transaction handle.
///
/// Created per request and discarded after the SQL is built and executed.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub model: String,
    pub records: Vec<Record>,
    /// One shared field-set, or one per record (bulk field-sets). Field-sets
    /// are ordered lists of field declaration indices.
    pub fieldsets: Vec<Vec<usize>>,
    pub filters: Vec<Filter>,
    pub pagination: Option<Pagination>,
    pub sort: Vec<Sort>,
    /// Identifier of a transaction previously opened on the store.
    pub transaction: Option<Uuid>,
}

impl Scope {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    pub fn records(mut self, records: Vec<Record>) -> Self {
        self.records.extend(records);
        self
    }

    /// Append a field-set; call once for a shared field-set, or once per
    /// record for heterogeneous bulk field-sets.
    pub fn fieldset(mut self, fields: Vec<usize>) -> Self {
        self.fieldsets.push(fields);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn paginate(mut self, limit: i64, offset: i64) -> Self {
        self.pagination = Some(Pagination { limit, offset });
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    /// Run the operation inside a previously begun transaction.
    pub fn in_transaction(mut self, id: Uuid) -> Self {
        self.transaction = Some(id);
        self
    }
}
