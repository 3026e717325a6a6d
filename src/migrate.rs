//! Idempotent schema and constraint migration.
//!
//! Tables migrate first for the whole batch, then constraints, so foreign
//! keys can reference tables created earlier in the same batch. Every DDL
//! statement is gated by a catalog introspection predicate and is strictly
//! additive; re-running migration against an up-to-date database issues no
//! DDL. Any DDL failure is fatal to the whole batch.

use std::sync::atomic::Ordering;

use tracing::{debug, info};

use crate::error::Result;
use crate::prepare::{MigrationState, PreparedModel};
use crate::sql::ddl::{add_column_sql, create_index_sql, create_table_sql};
use crate::sql::sanitize::quote_identifier;
use crate::store::ModelStore;
use crate::table::{Column, Constraint, Table};

/// View joining constraint and key-usage catalogs, used to look up unique
/// and foreign-key constraints per column.
pub(crate) fn constraint_view_sql(view_name: &str) -> String {
    format!(
        "CREATE OR REPLACE VIEW {} AS \
         SELECT tc.constraint_type, tc.table_schema, tc.table_name, kcu.column_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
         ON tc.constraint_name = kcu.constraint_name \
         AND tc.constraint_schema = kcu.constraint_schema",
        quote_identifier(view_name)
    )
}

impl ModelStore {
    /// Migrate every registered model, in registration order.
    pub async fn migrate_all(&self) -> Result<()> {
        let names = self
            .models
            .read()
            .expect("model registry lock poisoned")
            .names();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        self.migrate_models(&name_refs).await
    }

    /// Migrate the named models: tables for the whole batch, then
    /// constraints and indexes. Models already migrated are skipped.
    pub async fn migrate_models(&self, names: &[&str]) -> Result<()> {
        for name in names {
            let model = self.prepared(name)?;
            if self.state_of(name) < Some(MigrationState::TableMigrated) {
                self.migrate_table(&model)
                    .await
                    .map_err(|e| e.during("migrating failed"))?;
                self.advance(name, MigrationState::TableMigrated);
            }
        }
        for name in names {
            let model = self.prepared(name)?;
            if self.state_of(name) < Some(MigrationState::ConstraintsMigrated) {
                self.migrate_constraints(&model)
                    .await
                    .map_err(|e| e.during("migrating failed"))?;
                self.advance(name, MigrationState::ConstraintsMigrated);
            }
        }
        Ok(())
    }

    fn state_of(&self, name: &str) -> Option<MigrationState> {
        self.models
            .read()
            .expect("model registry lock poisoned")
            .state(name)
    }

    fn advance(&self, name: &str, state: MigrationState) {
        self.models
            .write()
            .expect("model registry lock poisoned")
            .advance_state(name, state);
    }

    async fn migrate_table(&self, model: &PreparedModel) -> Result<()> {
        let table = model.table();

        if !self.table_exists(table).await? {
            sqlx::query(&create_table_sql(table)?)
                .execute(&self.pool)
                .await?;
            // External columns need their own statement after creation.
            for column in table.columns.iter().filter(|c| c.external) {
                sqlx::query(&add_column_sql(table, column)?)
                    .execute(&self.pool)
                    .await?;
            }
            info!(model = %model.descriptor().name, table = %table.name, "created table");
            return Ok(());
        }

        let mut added = 0;
        for column in &table.columns {
            if !self.column_exists(table, column).await? {
                sqlx::query(&add_column_sql(table, column)?)
                    .execute(&self.pool)
                    .await?;
                added += 1;
            }
        }
        debug!(
            model = %model.descriptor().name,
            table = %table.name,
            added,
            "table up to date"
        );
        Ok(())
    }

    async fn migrate_constraints(&self, model: &PreparedModel) -> Result<()> {
        self.ensure_constraint_view().await?;
        let table = model.table();

        for column in &table.columns {
            for constraint in &column.constraints {
                if !self.constraint_exists(table, column, constraint).await? {
                    sqlx::query(&constraint.ddl(table, column))
                        .execute(&self.pool)
                        .await?;
                    info!(
                        table = %table.name,
                        column = %column.name,
                        kind = constraint.kind_name(),
                        "added constraint"
                    );
                }
            }
        }

        for index in &table.indexes {
            if !self.index_exists(table, &index.name).await? {
                sqlx::query(&create_index_sql(table, index))
                    .execute(&self.pool)
                    .await?;
                info!(table = %table.name, index = %index.name, "created index");
            }
        }
        Ok(())
    }

    async fn ensure_constraint_view(&self) -> Result<()> {
        if self.constraint_view_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        sqlx::query(&constraint_view_sql(&self.config.constraint_view))
            .execute(&self.pool)
            .await?;
        self.constraint_view_ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn table_exists(&self, table: &Table) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = $1 AND table_name = $2)",
        )
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn column_exists(&self, table: &Table, column: &Column) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 AND column_name = $3)",
        )
        .bind(&table.schema)
        .bind(&table.name)
        .bind(&column.name)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn constraint_exists(
        &self,
        table: &Table,
        column: &Column,
        constraint: &Constraint,
    ) -> Result<bool> {
        match constraint {
            Constraint::PrimaryKey => Ok(sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM information_schema.table_constraints \
                 WHERE table_schema = $1 AND table_name = $2 \
                 AND constraint_type = 'PRIMARY KEY')",
            )
            .bind(&table.schema)
            .bind(&table.name)
            .fetch_one(&self.pool)
            .await?),
            Constraint::NotNull => Ok(sqlx::query_scalar::<_, bool>(
                "SELECT is_nullable = 'NO' FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 AND column_name = $3",
            )
            .bind(&table.schema)
            .bind(&table.name)
            .bind(&column.name)
            .fetch_optional(&self.pool)
            .await?
            .unwrap_or(false)),
            Constraint::Unique => self.column_has_constraint(table, column, "UNIQUE").await,
            Constraint::ForeignKey { .. } => {
                self.column_has_constraint(table, column, "FOREIGN KEY").await
            }
        }
    }

    async fn column_has_constraint(
        &self,
        table: &Table,
        column: &Column,
        constraint_type: &str,
    ) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} \
             WHERE table_schema = $1 AND table_name = $2 \
             AND column_name = $3 AND constraint_type = $4)",
            quote_identifier(&self.config.constraint_view)
        );
        Ok(sqlx::query_scalar::<_, bool>(&sql)
            .bind(&table.schema)
            .bind(&table.name)
            .bind(&column.name)
            .bind(constraint_type)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn index_exists(&self, table: &Table, index_name: &str) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pg_indexes \
             WHERE schemaname = $1 AND tablename = $2 AND indexname = $3)",
        )
        .bind(&table.schema)
        .bind(&table.name)
        .bind(index_name)
        .fetch_one(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_view_sql() {
        let sql = constraint_view_sql("__pgmodel_constraints");
        assert!(sql.starts_with("CREATE OR REPLACE VIEW \"__pgmodel_constraints\" AS"));
        assert!(sql.contains("information_schema.table_constraints"));
        assert!(sql.contains("information_schema.key_column_usage"));
        assert!(sql.contains("tc.constraint_name = kcu.constraint_name"));
    }
}
