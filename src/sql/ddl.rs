//! DDL generation for table and index migration.
//!
//! Migration is strictly additive: tables and columns are created when
//! introspection finds them missing, never dropped or rewritten. Constraint
//! DDL lives on [`Constraint`](crate::table::Constraint).

use crate::error::Result;
use crate::sql::sanitize::quote_identifier;
use crate::table::{Column, Index, Table};

/// `CREATE TABLE IF NOT EXISTS` with one `name type` pair per column.
///
/// Columns whose data type requires a separate statement (external types)
/// are excluded from the inline list; see [`add_column_sql`].
pub fn create_table_sql(table: &Table) -> Result<String> {
    let mut column_defs = Vec::with_capacity(table.columns.len());
    for column in table.columns.iter().filter(|c| !c.external) {
        column_defs.push(format_column(column)?);
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table.qualified(),
        column_defs.join(", ")
    ))
}

/// `ALTER TABLE ... ADD COLUMN` for one missing column.
pub fn add_column_sql(table: &Table, column: &Column) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {}",
        table.qualified(),
        format_column(column)?
    ))
}

/// `CREATE INDEX ... USING <method>` for one declared index.
pub fn create_index_sql(table: &Table, index: &Index) -> String {
    let columns: Vec<String> = index
        .columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect();
    format!(
        "CREATE INDEX {} ON {} USING {} ({})",
        quote_identifier(&index.name),
        table.qualified(),
        index.method.sql(),
        columns.join(", ")
    )
}

fn format_column(column: &Column) -> Result<String> {
    Ok(format!(
        "{} {}",
        quote_identifier(&column.name),
        column.sql_type()?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::IndexMethod;

    fn table_with_columns() -> Table {
        let mut table = Table::new("public", "products");
        for (index, (name, sql_type, external)) in [
            ("id", "bigserial", false),
            ("sku", "varchar(20)", false),
            ("search", "tsvector", true),
        ]
        .iter()
        .enumerate()
        {
            let mut column = Column::new(index);
            column.name = name.to_string();
            column.sql_type = Some(sql_type.to_string());
            column.external = *external;
            table.columns.push(column);
        }
        table
    }

    #[test]
    fn test_create_table_excludes_external_columns() {
        let table = table_with_columns();
        let sql = create_table_sql(&table).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"public\".\"products\" \
             (\"id\" bigserial, \"sku\" varchar(20))"
        );
    }

    #[test]
    fn test_add_column() {
        let table = table_with_columns();
        let sql = add_column_sql(&table, &table.columns[2]).unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE \"public\".\"products\" ADD COLUMN \"search\" tsvector"
        );
    }

    #[test]
    fn test_add_column_unresolved_type_fails() {
        let table = table_with_columns();
        let column = Column::new(5);
        assert!(add_column_sql(&table, &column).is_err());
    }

    #[test]
    fn test_create_index() {
        let table = table_with_columns();
        let mut index = Index::new("idx_products_sku", IndexMethod::BTree);
        index.columns.push("sku".to_string());
        assert_eq!(
            create_index_sql(&table, &index),
            "CREATE INDEX \"idx_products_sku\" ON \"public\".\"products\" \
             USING btree (\"sku\")"
        );
    }

    #[test]
    fn test_create_index_multi_column_gin() {
        let table = table_with_columns();
        let mut index = Index::new("idx_search", IndexMethod::Gin);
        index.columns.push("search".to_string());
        index.columns.push("sku".to_string());
        let sql = create_index_sql(&table, &index);
        assert!(sql.contains("USING gin"));
        assert!(sql.contains("(\"search\", \"sku\")"));
    }
}
