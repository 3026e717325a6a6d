//! ModelStore - entry point for model registration, migration and CRUD
//! execution against a PostgreSQL database.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, Row};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::datatype::TypeRegistry;
use crate::error::{Result, StoreError};
use crate::model::{ModelDescriptor, Record};
use crate::prepare::{ModelRegistry, PreparedModel};
use crate::scope::Scope;
use crate::sql::delete::{build_delete, build_delete_records};
use crate::sql::insert::{build_insert, build_insert_bulk, InsertStatement};
use crate::sql::select::{build_count, build_find};
use crate::sql::update::{build_update, build_update_batch, build_update_where};
use crate::sql::BuiltStatement;
use crate::tags::TagSetterRegistry;
use crate::transaction::{TransactionRegistry, TxOptions};
use crate::value::SqlValue;

/// Reflection-driven PostgreSQL model store.
///
/// Owns the connection pool, the data-type and tag-setter registries (built
/// at construction, read-only afterwards), the prepared-model registry and
/// the transaction map.
pub struct ModelStore {
    pub(crate) pool: PgPool,
    pub(crate) config: StoreConfig,
    pub(crate) types: TypeRegistry,
    pub(crate) tags: TagSetterRegistry,
    pub(crate) models: RwLock<ModelRegistry>,
    pub(crate) transactions: TransactionRegistry,
    pub(crate) constraint_view_ready: AtomicBool,
}

impl ModelStore {
    /// Connect to the database and create a store with builtin registries.
    pub async fn new(config: StoreConfig) -> Result<Self> {
        let pool = PgPool::connect(&config.database_url).await.map_err(|e| {
            StoreError::Connection(format!("database connection failed: {e}"))
        })?;
        Ok(Self::from_pool(pool, config))
    }

    /// Create a store over an existing pool with builtin registries.
    pub fn from_pool(pool: PgPool, config: StoreConfig) -> Self {
        Self::with_registries(
            pool,
            config,
            TypeRegistry::with_builtins(),
            TagSetterRegistry::with_builtins(),
        )
    }

    /// Create a store with custom registries; registries are read-only once
    /// the store starts serving operations.
    pub fn with_registries(
        pool: PgPool,
        config: StoreConfig,
        types: TypeRegistry,
        tags: TagSetterRegistry,
    ) -> Self {
        Self {
            pool,
            config,
            types,
            tags,
            models: RwLock::new(ModelRegistry::new()),
            transactions: TransactionRegistry::new(),
            constraint_view_ready: AtomicBool::new(false),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // =========================================================================
    // Model registration
    // =========================================================================

    /// Register and prepare a model. Idempotent: registering the same model
    /// name again returns the cached preparation.
    pub fn register_model(&self, descriptor: ModelDescriptor) -> Result<Arc<PreparedModel>> {
        self.models
            .write()
            .expect("model registry lock poisoned")
            .prepare(&self.config, &self.types, &self.tags, descriptor)
    }

    /// Look up a prepared model; an unregistered model is a programming
    /// error, not user input.
    pub fn prepared(&self, name: &str) -> Result<Arc<PreparedModel>> {
        self.models
            .read()
            .expect("model registry lock poisoned")
            .get(name)
            .ok_or_else(|| StoreError::internal(format!("model '{name}' is not registered")))
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Begin a transaction, returning the identifier scopes refer to.
    pub async fn begin(&self, options: TxOptions) -> Result<Uuid> {
        let mut tx = self.pool.begin().await?;
        if let Some(isolation) = options.isolation {
            let sql = format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.sql());
            sqlx::query(&sql).execute(&mut *tx).await?;
        }
        if options.read_only {
            sqlx::query("SET TRANSACTION READ ONLY")
                .execute(&mut *tx)
                .await?;
        }
        let id = Uuid::new_v4();
        self.transactions.insert(id, tx);
        Ok(id)
    }

    pub async fn commit(&self, id: Uuid) -> Result<()> {
        let tx = self.transactions.take(id)?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(&self, id: Uuid) -> Result<()> {
        let tx = self.transactions.take(id)?;
        tx.rollback().await?;
        Ok(())
    }

    // =========================================================================
    // CRUD execution
    // =========================================================================

    /// Insert the scope's records, scanning generated primary keys back into
    /// them in original record order.
    pub async fn insert(&self, scope: &mut Scope) -> Result<()> {
        let model = self.prepared(&scope.model)?;
        let statements = plan_inserts(&model, scope, self.config.fill_not_null)?;

        match scope.transaction {
            Some(id) => {
                let mut tx = self.transactions.take(id)?;
                let result =
                    apply_inserts(&mut tx, &model, &mut scope.records, &statements).await;
                self.transactions.put(id, tx);
                result.map_err(|e| e.during("inserting failed"))
            }
            // A batch outside a caller transaction still commits atomically;
            // the first failing entry aborts the remainder.
            None if statements.len() > 1 => {
                let mut tx = self.pool.begin().await?;
                apply_inserts(&mut tx, &model, &mut scope.records, &statements)
                    .await
                    .map_err(|e| e.during("inserting failed"))?;
                tx.commit().await?;
                Ok(())
            }
            None => {
                let mut conn = self.pool.acquire().await?;
                apply_inserts(&mut conn, &model, &mut scope.records, &statements)
                    .await
                    .map_err(|e| e.during("inserting failed"))
            }
        }
    }

    /// Update the scope's records by primary key through one shared
    /// field-set. A single record that matches nothing is `NoResult`.
    pub async fn update(&self, scope: &Scope) -> Result<()> {
        let model = self.prepared(&scope.model)?;
        if scope.records.is_empty() {
            return Err(StoreError::NoRecords("update requires records".to_string()));
        }
        let fieldset = single_fieldset(scope, "update")?;

        if scope.records.len() == 1 {
            let statement = build_update(&model, &scope.records[0], fieldset)?;
            let affected = self
                .execute_one(scope.transaction, &statement)
                .await
                .map_err(|e| e.during("updating failed"))?;
            if affected == 0 {
                return Err(StoreError::NoResult);
            }
            return Ok(());
        }

        let statements = build_update_batch(&model, &scope.records, fieldset)?;
        self.execute_batch(scope.transaction, &statements)
            .await
            .map_err(|e| e.during("updating failed"))?;
        Ok(())
    }

    /// Update all rows matching the scope's filters from one template
    /// record, returning the affected-row count.
    pub async fn update_where(&self, scope: &Scope) -> Result<u64> {
        let model = self.prepared(&scope.model)?;
        if scope.records.len() != 1 {
            return Err(StoreError::NoRecords(
                "filtered update requires exactly one template record".to_string(),
            ));
        }
        let fieldset = single_fieldset(scope, "filtered update")?;

        let statement =
            build_update_where(&model, &scope.records[0], fieldset, &scope.filters)?;
        self.execute_one(scope.transaction, &statement)
            .await
            .map_err(|e| e.during("updating failed"))
    }

    /// Delete by filters, or by primary key when the scope carries explicit
    /// records. Returns the affected-row count; deleting exactly one record
    /// that matches nothing is `NoResult`.
    pub async fn delete(&self, scope: &Scope) -> Result<u64> {
        let model = self.prepared(&scope.model)?;
        let statement = if scope.records.is_empty() {
            build_delete(&model, &scope.filters)?
        } else {
            build_delete_records(&model, &scope.records)?
        };

        let affected = self
            .execute_one(scope.transaction, &statement)
            .await
            .map_err(|e| e.during("deleting failed"))?;
        if scope.records.len() == 1 && affected == 0 {
            return Err(StoreError::NoResult);
        }
        Ok(affected)
    }

    /// Find records matching the scope.
    pub async fn find(&self, scope: &Scope) -> Result<Vec<Record>> {
        let model = self.prepared(&scope.model)?;
        if scope.fieldsets.len() > 1 {
            return Err(StoreError::fieldset(
                "find accepts at most one field-set",
            ));
        }

        let statement = build_find(
            &model,
            scope.fieldsets.first().map(Vec::as_slice),
            &scope.filters,
            &scope.sort,
            scope.pagination,
        )?;

        let rows = self
            .fetch_all_one(
                scope.transaction,
                &statement.sql,
                statement.values.clone(),
            )
            .await
            .map_err(|e| e.during("selecting failed"))?;

        let descriptor = model.descriptor();
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = Record::zeroed(descriptor);
            for (ordinal, &field_index) in statement.projection.iter().enumerate() {
                let value =
                    SqlValue::decode(row, ordinal, descriptor.fields[field_index].value_type)?;
                record.set(field_index, value)?;
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Count distinct primary keys matching the scope's filters.
    pub async fn count(&self, scope: &Scope) -> Result<i64> {
        let model = self.prepared(&scope.model)?;
        let statement = build_count(&model, &scope.filters)?;

        let rows = self
            .fetch_all_one(
                scope.transaction,
                &statement.sql,
                statement.values.clone(),
            )
            .await
            .map_err(|e| e.during("counting failed"))?;
        let row = rows
            .first()
            .ok_or_else(|| StoreError::internal("count returned no row"))?;
        Ok(row.try_get::<i64, _>(0).map_err(StoreError::from)?)
    }

    // =========================================================================
    // Execution plumbing
    // =========================================================================

    async fn execute_one(&self, tx: Option<Uuid>, statement: &BuiltStatement) -> Result<u64> {
        match tx {
            Some(id) => {
                let mut tx_conn = self.transactions.take(id)?;
                let result = bind_statement(&statement.sql, statement.values.clone())
                    .execute(&mut *tx_conn)
                    .await;
                self.transactions.put(id, tx_conn);
                Ok(result.map_err(StoreError::from)?.rows_affected())
            }
            None => Ok(bind_statement(&statement.sql, statement.values.clone())
                .execute(&self.pool)
                .await
                .map_err(StoreError::from)?
                .rows_affected()),
        }
    }

    async fn execute_batch(
        &self,
        tx: Option<Uuid>,
        statements: &[BuiltStatement],
    ) -> Result<u64> {
        match tx {
            Some(id) => {
                let mut tx_conn = self.transactions.take(id)?;
                let result = apply_statements(&mut tx_conn, statements).await;
                self.transactions.put(id, tx_conn);
                result
            }
            None => {
                let mut tx = self.pool.begin().await?;
                let affected = apply_statements(&mut tx, statements).await?;
                tx.commit().await?;
                Ok(affected)
            }
        }
    }

    async fn fetch_all_one(
        &self,
        tx: Option<Uuid>,
        sql: &str,
        values: Vec<SqlValue>,
    ) -> Result<Vec<PgRow>> {
        match tx {
            Some(id) => {
                let mut tx_conn = self.transactions.take(id)?;
                let result = bind_statement(sql, values).fetch_all(&mut *tx_conn).await;
                self.transactions.put(id, tx_conn);
                Ok(result?)
            }
            None => Ok(bind_statement(sql, values).fetch_all(&self.pool).await?),
        }
    }
}

fn bind_statement<'q>(
    sql: &'q str,
    values: Vec<SqlValue>,
) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for value in values {
        query = value.bind(query);
    }
    query
}

fn single_fieldset<'a>(scope: &'a Scope, operation: &str) -> Result<&'a [usize]> {
    match scope.fieldsets.as_slice() {
        [fieldset] => Ok(fieldset),
        _ => Err(StoreError::fieldset(format!(
            "{operation} requires exactly one field-set, got {}",
            scope.fieldsets.len()
        ))),
    }
}

fn plan_inserts(
    model: &PreparedModel,
    scope: &Scope,
    fill_not_null: bool,
) -> Result<Vec<InsertStatement>> {
    if scope.records.is_empty() {
        return Err(StoreError::NoRecords("insert requires records".to_string()));
    }
    let all_indices: Vec<usize> = (0..scope.records.len()).collect();

    match scope.fieldsets.as_slice() {
        // Default field-set: every column except the primary key, so
        // generated keys come back through RETURNING.
        [] => {
            let fieldset: Vec<usize> = model
                .table()
                .columns
                .iter()
                .filter(|c| !c.is_primary())
                .map(|c| c.field_index)
                .collect();
            Ok(vec![build_insert(
                model,
                &scope.records,
                &all_indices,
                &fieldset,
                fill_not_null,
            )?])
        }
        [fieldset] => Ok(vec![build_insert(
            model,
            &scope.records,
            &all_indices,
            fieldset,
            fill_not_null,
        )?]),
        fieldsets => build_insert_bulk(model, &scope.records, fieldsets, fill_not_null),
    }
}

async fn apply_inserts(
    conn: &mut PgConnection,
    model: &PreparedModel,
    records: &mut [Record],
    statements: &[InsertStatement],
) -> Result<()> {
    let descriptor = model.descriptor();
    for statement in statements {
        if statement.returning_pk {
            let rows = bind_statement(&statement.sql, statement.values.clone())
                .fetch_all(&mut *conn)
                .await?;
            if rows.len() != statement.record_indices.len() {
                return Err(StoreError::internal(format!(
                    "insert returned {} rows for {} records",
                    rows.len(),
                    statement.record_indices.len()
                )));
            }
            let (pk_index, pk_field) = descriptor.primary().ok_or_else(|| {
                StoreError::internal(format!("model '{}' has no primary key", descriptor.name))
            })?;
            for (row, &record_index) in rows.iter().zip(&statement.record_indices) {
                let value = SqlValue::decode(row, 0, pk_field.value_type)?;
                records[record_index].set(pk_index, value)?;
            }
        } else {
            bind_statement(&statement.sql, statement.values.clone())
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

async fn apply_statements(
    conn: &mut PgConnection,
    statements: &[BuiltStatement],
) -> Result<u64> {
    let mut affected = 0;
    for statement in statements {
        affected += bind_statement(&statement.sql, statement.values.clone())
            .execute(&mut *conn)
            .await
            .map_err(StoreError::from)?
            .rows_affected();
    }
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::testutil::prepared_model;

    fn scope_with_records(n: usize) -> Scope {
        let model = prepared_model();
        let records: Vec<Record> = (0..n)
            .map(|_| Record::zeroed(model.descriptor()))
            .collect();
        Scope::new("Model").records(records)
    }

    #[test]
    fn test_plan_inserts_default_fieldset_excludes_pk() {
        let model = prepared_model();
        let scope = scope_with_records(2);
        let statements = plan_inserts(&model, &scope, true).unwrap();

        assert_eq!(statements.len(), 1);
        assert!(statements[0].returning_pk);
        assert!(!statements[0].sql.contains("(\"id\""));
        assert!(statements[0].sql.contains("VALUES ($1,$2),($3,$4)"));
    }

    #[test]
    fn test_plan_inserts_bulk_groups() {
        let model = prepared_model();
        let scope = scope_with_records(3)
            .fieldset(vec![1])
            .fieldset(vec![1, 2])
            .fieldset(vec![1]);
        let statements = plan_inserts(&model, &scope, false).unwrap();

        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].record_indices, vec![0, 2]);
        assert_eq!(statements[1].record_indices, vec![1]);
    }

    #[test]
    fn test_plan_inserts_empty_scope() {
        let model = prepared_model();
        let scope = Scope::new("Model");
        assert!(matches!(
            plan_inserts(&model, &scope, true),
            Err(StoreError::NoRecords(_))
        ));
    }

    #[test]
    fn test_single_fieldset_guard() {
        let scope = scope_with_records(1).fieldset(vec![1]);
        assert!(single_fieldset(&scope, "update").is_ok());

        let scope = scope_with_records(1);
        assert!(matches!(
            single_fieldset(&scope, "update"),
            Err(StoreError::Fieldset(_))
        ));

        let scope = scope_with_records(1).fieldset(vec![1]).fieldset(vec![2]);
        assert!(matches!(
            single_fieldset(&scope, "update"),
            Err(StoreError::Fieldset(_))
        ));
    }
}
