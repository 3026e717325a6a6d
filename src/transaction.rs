//! Transaction registry: transaction-bound connections looked up by
//! identifier, with isolation-level and read-only mapping.
//!
//! Begin/commit/rollback are expected to be called from a single logical
//! flow per transaction; the registry only guards the map itself.

use std::collections::HashMap;
use std::sync::Mutex;

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// The four standard SQL isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options for beginning a transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

/// Live transactions keyed by identifier.
#[derive(Default)]
pub struct TransactionRegistry {
    inner: Mutex<HashMap<Uuid, Transaction<'static, Postgres>>>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: Uuid, tx: Transaction<'static, Postgres>) {
        self.inner
            .lock()
            .expect("transaction registry lock poisoned")
            .insert(id, tx);
    }

    /// Check a transaction out of the registry; the caller puts it back
    /// with [`TransactionRegistry::put`] unless it is being finished.
    pub fn take(&self, id: Uuid) -> Result<Transaction<'static, Postgres>> {
        self.inner
            .lock()
            .expect("transaction registry lock poisoned")
            .remove(&id)
            .ok_or_else(|| StoreError::transaction(format!("no transaction mapped to id {id}")))
    }

    pub fn put(&self, id: Uuid, tx: Transaction<'static, Postgres>) {
        self.inner
            .lock()
            .expect("transaction registry lock poisoned")
            .insert(id, tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_sql() {
        assert_eq!(IsolationLevel::ReadUncommitted.sql(), "READ UNCOMMITTED");
        assert_eq!(IsolationLevel::ReadCommitted.sql(), "READ COMMITTED");
        assert_eq!(IsolationLevel::RepeatableRead.sql(), "REPEATABLE READ");
        assert_eq!(IsolationLevel::Serializable.sql(), "SERIALIZABLE");
    }

    #[test]
    fn test_take_unknown_id_is_transaction_error() {
        let registry = TransactionRegistry::new();
        assert!(matches!(
            registry.take(Uuid::new_v4()),
            Err(StoreError::Transaction(_))
        ));
    }

    #[test]
    fn test_tx_options_default() {
        let options = TxOptions::default();
        assert!(options.isolation.is_none());
        assert!(!options.read_only);
    }
}
