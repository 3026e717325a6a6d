//! Schema-level representation of prepared models: tables, columns,
//! constraints and indexes.

use crate::error::{Result, StoreError};
use crate::sql::sanitize::{qualify, quote_identifier};

/// A named rule attached to a column, emitted as additive DDL during
/// constraint migration.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    PrimaryKey,
    NotNull,
    Unique,
    ForeignKey { table: String, column: String },
}

impl Constraint {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Constraint::PrimaryKey => "primary-key",
            Constraint::NotNull => "not-null",
            Constraint::Unique => "unique",
            Constraint::ForeignKey { .. } => "foreign-key",
        }
    }

    /// The `ALTER TABLE` statement adding this constraint.
    pub fn ddl(&self, table: &Table, column: &Column) -> String {
        let target = table.qualified();
        let col = quote_identifier(&column.name);
        match self {
            Constraint::PrimaryKey => {
                format!("ALTER TABLE {target} ADD PRIMARY KEY ({col})")
            }
            Constraint::NotNull => {
                format!("ALTER TABLE {target} ALTER COLUMN {col} SET NOT NULL")
            }
            Constraint::Unique => {
                let name = quote_identifier(&format!("{}_{}_key", table.name, column.name));
                format!("ALTER TABLE {target} ADD CONSTRAINT {name} UNIQUE ({col})")
            }
            Constraint::ForeignKey {
                table: ref_table,
                column: ref_column,
            } => format!(
                "ALTER TABLE {target} ADD FOREIGN KEY ({col}) REFERENCES {} ({})",
                qualify(&table.schema, ref_table),
                quote_identifier(ref_column)
            ),
        }
    }
}

/// Index access method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMethod {
    #[default]
    BTree,
    Hash,
    Gist,
    Gin,
}

impl IndexMethod {
    /// Parse a bare index-type token from an `index` tag.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "btree" => Some(IndexMethod::BTree),
            "hash" => Some(IndexMethod::Hash),
            "gist" => Some(IndexMethod::Gist),
            "gin" => Some(IndexMethod::Gin),
            _ => None,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            IndexMethod::BTree => "btree",
            IndexMethod::Hash => "hash",
            IndexMethod::Gist => "gist",
            IndexMethod::Gin => "gin",
        }
    }
}

/// A named index over one or more columns, deduplicated by name per table.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub name: String,
    pub method: IndexMethod,
    pub columns: Vec<String>,
}

impl Index {
    pub fn new(name: impl Into<String>, method: IndexMethod) -> Self {
        Self {
            name: name.into(),
            method,
            columns: Vec::new(),
        }
    }
}

/// One model field as a SQL table column.
///
/// Created during preparation, mutated only by tag setters in that same
/// pass; the resolved SQL type is filled exactly once before any DDL or
/// CRUD SQL referencing the column is emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Declaration index of the source field in the model descriptor.
    pub field_index: usize,
    pub name: String,
    /// Registry key of the resolved SQL type (e.g. "varchar").
    pub type_name: Option<String>,
    /// Literal parameters from a `type=` tag (e.g. `["20"]`).
    pub type_params: Vec<String>,
    /// Fully rendered SQL type text (e.g. `varchar(20)`).
    pub sql_type: Option<String>,
    /// Whether the column is added with its own statement after CREATE TABLE.
    pub external: bool,
    pub nullable: bool,
    pub constraints: Vec<Constraint>,
}

impl Column {
    pub fn new(field_index: usize) -> Self {
        Self {
            field_index,
            name: String::new(),
            type_name: None,
            type_params: Vec::new(),
            sql_type: None,
            external: false,
            nullable: false,
            constraints: Vec::new(),
        }
    }

    /// The rendered SQL type; unresolved type is a fatal internal error.
    pub fn sql_type(&self) -> Result<&str> {
        self.sql_type.as_deref().ok_or_else(|| {
            StoreError::internal(format!("column '{}' has no resolved data type", self.name))
        })
    }

    /// Append a constraint unless an equivalent one is already present.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        let duplicate = self.constraints.iter().any(|existing| {
            std::mem::discriminant(existing) == std::mem::discriminant(&constraint)
        });
        if !duplicate {
            self.constraints.push(constraint);
        }
    }

    pub fn is_primary(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::PrimaryKey))
    }

    pub fn has_not_null(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::NotNull))
    }
}

/// A model's table: schema, name, ordered columns and indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub schema: String,
    pub name: String,
    /// Columns in field declaration order; the order is stable because
    /// positional placeholders are emitted in it.
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
}

impl Table {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// The quoted, schema-qualified table name.
    pub fn qualified(&self) -> String {
        qualify(&self.schema, &self.name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_for_field(&self, field_index: usize) -> Option<&Column> {
        self.columns.iter().find(|c| c.field_index == field_index)
    }

    pub fn primary_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> (Table, Column) {
        let mut table = Table::new("public", "products");
        let mut column = Column::new(1);
        column.name = "sku".to_string();
        column.sql_type = Some("text".to_string());
        table.columns.push(column.clone());
        (table, column)
    }

    #[test]
    fn test_qualified_name() {
        let table = Table::new("public", "products");
        assert_eq!(table.qualified(), "\"public\".\"products\"");
    }

    #[test]
    fn test_primary_key_ddl() {
        let (table, column) = sample_table();
        assert_eq!(
            Constraint::PrimaryKey.ddl(&table, &column),
            "ALTER TABLE \"public\".\"products\" ADD PRIMARY KEY (\"sku\")"
        );
    }

    #[test]
    fn test_not_null_ddl() {
        let (table, column) = sample_table();
        assert_eq!(
            Constraint::NotNull.ddl(&table, &column),
            "ALTER TABLE \"public\".\"products\" ALTER COLUMN \"sku\" SET NOT NULL"
        );
    }

    #[test]
    fn test_unique_ddl() {
        let (table, column) = sample_table();
        assert_eq!(
            Constraint::Unique.ddl(&table, &column),
            "ALTER TABLE \"public\".\"products\" ADD CONSTRAINT \"products_sku_key\" UNIQUE (\"sku\")"
        );
    }

    #[test]
    fn test_foreign_key_ddl() {
        let (table, column) = sample_table();
        let fk = Constraint::ForeignKey {
            table: "vendors".to_string(),
            column: "id".to_string(),
        };
        assert_eq!(
            fk.ddl(&table, &column),
            "ALTER TABLE \"public\".\"products\" ADD FOREIGN KEY (\"sku\") REFERENCES \"public\".\"vendors\" (\"id\")"
        );
    }

    #[test]
    fn test_constraint_dedup() {
        let mut column = Column::new(0);
        column.add_constraint(Constraint::NotNull);
        column.add_constraint(Constraint::NotNull);
        column.add_constraint(Constraint::Unique);
        assert_eq!(column.constraints.len(), 2);
    }

    #[test]
    fn test_unresolved_type_is_internal_error() {
        let column = Column::new(0);
        assert!(matches!(
            column.sql_type(),
            Err(StoreError::Internal(_))
        ));
    }

    #[test]
    fn test_index_method_parse() {
        assert_eq!(IndexMethod::parse("gin"), Some(IndexMethod::Gin));
        assert_eq!(IndexMethod::parse("btree"), Some(IndexMethod::BTree));
        assert_eq!(IndexMethod::parse("bitmap"), None);
    }
}
