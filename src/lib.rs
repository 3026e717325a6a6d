//! # pgmodel
//!
//! A reflection-driven PostgreSQL model store.
//!
//! Given an abstract description of application data models (fields, kinds,
//! relationships, declarative tags) and backend-agnostic query descriptors
//! (filters, field selection, pagination), this crate synthesizes
//! parameterized CRUD SQL and generates idempotent, additive-only DDL that
//! evolves tables to match the current model description.
//!
//! ## Features
//!
//! - **Model preparation**: one `Table`/`Column` graph per model, built once
//!   from field descriptors, with tag-driven column configuration
//!   (`name=`, `index=`, `type=`, `notnull`, `unique`, `-`)
//! - **Data-type resolution**: native type → SQL type with kind defaults,
//!   auto-increment primary keys and timezone-aware timestamps
//! - **Idempotent migration**: tables, columns, constraints and indexes are
//!   created only when catalog introspection reports them missing
//! - **Filter compiler**: operator registry producing WHERE fragments with
//!   strictly positional `$N` placeholders from one per-statement counter
//! - **Typed errors**: SQLSTATE-classified taxonomy; "nothing matched" is
//!   distinct from "write failed"
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pgmodel::{
//!     FieldDescriptor, FieldKind, Filter, ModelDescriptor, ModelStore, Record,
//!     Scope, StoreConfig, ValueType,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfig::builder("postgres://localhost/mydb").build();
//!     let store = ModelStore::new(config).await?;
//!
//!     // Describe and prepare a model.
//!     let product = ModelDescriptor::new("Product")
//!         .field(FieldDescriptor::new("id", FieldKind::Primary, ValueType::Int64))
//!         .field(
//!             FieldDescriptor::new("sku", FieldKind::Attribute, ValueType::Text)
//!                 .tag("unique;index"),
//!         )
//!         .field(FieldDescriptor::new("in_stock", FieldKind::Attribute, ValueType::Bool));
//!     store.register_model(product)?;
//!
//!     // Create/evolve the table, then its constraints and indexes.
//!     store.migrate_all().await?;
//!
//!     // Insert a record; the generated primary key is scanned back.
//!     let descriptor = store.prepared("Product")?.descriptor().clone();
//!     let mut scope = Scope::new("Product").record(Record::zeroed(&descriptor));
//!     store.insert(&mut scope).await?;
//!
//!     // Query with filters and pagination.
//!     let found = store
//!         .find(
//!             &Scope::new("Product")
//!                 .filter(Filter::eq("in_stock", false))
//!                 .paginate(10, 0),
//!         )
//!         .await?;
//!     println!("{} products", found.len());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod datatype;
pub mod error;
pub mod migrate;
pub mod model;
pub mod prepare;
pub mod scope;
pub mod sql;
pub mod store;
pub mod table;
pub mod tags;
pub mod transaction;
pub mod value;

// Re-export main types for convenience
pub use config::{StoreConfig, StoreConfigBuilder};
pub use datatype::{SqlType, SqlTypeKind, TypeRegistry};
pub use error::{Result, StoreError, ViolationKind};
pub use model::{FieldDescriptor, FieldKind, ForeignRef, ModelDescriptor, Record, Tag};
pub use prepare::{MigrationState, ModelRegistry, PreparedModel};
pub use scope::{Pagination, Scope, Sort, SortDirection};
pub use store::ModelStore;
pub use table::{Column, Constraint, Index, IndexMethod, Table};
pub use tags::{TagContext, TagSetter, TagSetterRegistry};
pub use transaction::{IsolationLevel, TxOptions};
pub use value::{SqlValue, ValueType};

// Re-export SQL utilities for advanced users
pub use sql::filter::{Filter, FilterOperator, ParamCounter};
pub use sql::{qualify, quote_identifier, validate_identifier};
