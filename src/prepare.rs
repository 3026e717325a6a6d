//! Model preparation: building the Table/Column graph from a descriptor,
//! exactly once per model.
//!
//! The registry entry doubles as the "already prepared" marker; preparing a
//! model twice returns the cached graph without re-running tag setters.

use std::collections::HashMap;
use std::sync::Arc;

use convert_case::{Case, Casing};

use crate::config::StoreConfig;
use crate::datatype::TypeRegistry;
use crate::error::{Result, StoreError};
use crate::model::{FieldKind, ModelDescriptor};
use crate::sql::sanitize::validate_identifier;
use crate::table::{Column, Constraint, Table};
use crate::tags::{TagContext, TagSetterRegistry};

/// Per-model migration progress. Transitions are one-directional;
/// re-entering a reached state is a no-op, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MigrationState {
    Prepared,
    TableMigrated,
    ConstraintsMigrated,
}

/// A model with its prepared schema graph.
#[derive(Debug)]
pub struct PreparedModel {
    descriptor: ModelDescriptor,
    table: Table,
}

impl PreparedModel {
    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// The primary-key column; an internal error when the model has none.
    pub fn primary_column(&self) -> Result<&Column> {
        self.table.primary_column().ok_or_else(|| {
            StoreError::internal(format!(
                "model '{}' has no primary-key column",
                self.descriptor.name
            ))
        })
    }
}

/// Registry of prepared models, keyed by model name, in registration order.
#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<PreparedModel>>,
    states: HashMap<String, MigrationState>,
    order: Vec<String>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<PreparedModel>> {
        self.models.get(name).cloned()
    }

    /// Model names in registration order (migration iterates this).
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn state(&self, name: &str) -> Option<MigrationState> {
        self.states.get(name).copied()
    }

    /// Advance a model's migration state; moving backwards is ignored.
    pub fn advance_state(&mut self, name: &str, state: MigrationState) {
        match self.states.get_mut(name) {
            Some(current) if *current >= state => {}
            Some(current) => *current = state,
            None => {
                self.states.insert(name.to_string(), state);
            }
        }
    }

    /// Prepare a model: idempotent, returns the cached graph when the model
    /// is already registered.
    pub fn prepare(
        &mut self,
        config: &StoreConfig,
        types: &TypeRegistry,
        tags: &TagSetterRegistry,
        descriptor: ModelDescriptor,
    ) -> Result<Arc<PreparedModel>> {
        if let Some(existing) = self.models.get(&descriptor.name) {
            return Ok(existing.clone());
        }

        let prepared = Arc::new(build_model(config, types, tags, descriptor)?);
        let name = prepared.descriptor.name.clone();
        self.models.insert(name.clone(), prepared.clone());
        self.states.insert(name.clone(), MigrationState::Prepared);
        self.order.push(name);
        Ok(prepared)
    }
}

fn build_model(
    config: &StoreConfig,
    types: &TypeRegistry,
    tags: &TagSetterRegistry,
    descriptor: ModelDescriptor,
) -> Result<PreparedModel> {
    let schema = descriptor
        .schema_name
        .clone()
        .unwrap_or_else(|| config.default_schema.clone());
    let table_name = descriptor
        .table_name
        .clone()
        .unwrap_or_else(|| pluralize(&snake_case(&descriptor.name)));

    for name in [schema.as_str(), table_name.as_str()] {
        validate_identifier(name).map_err(|e| {
            StoreError::internal(format!("model '{}': {e}", descriptor.name))
        })?;
    }

    let mut columns = Vec::new();
    let mut indexes = Vec::new();

    for (field_index, field) in descriptor.fields.iter().enumerate() {
        if !field.kind.has_column() || field.is_omitted() {
            continue;
        }

        let mut column = Column::new(field_index);
        column.nullable = field.nullable;

        for tag in &field.tags {
            let Some(setter) = tags.get(&tag.key) else {
                tracing::debug!(
                    model = %descriptor.name,
                    field = %field.name,
                    tag = %tag.key,
                    "ignoring unknown tag key"
                );
                continue;
            };
            let mut ctx = TagContext {
                model: &descriptor,
                field,
                table_name: &table_name,
                value: tag.value.as_deref(),
                column: &mut column,
                indexes: &mut indexes,
                types,
            };
            setter(&mut ctx)?;
        }

        if column.name.is_empty() {
            column.name = snake_case(&field.name);
        }
        if column.sql_type.is_none() {
            let ty = types.resolve(&descriptor, field)?;
            column.sql_type = Some(ty.render(&[])?);
            column.type_name = Some(ty.name.clone());
            column.external = ty.external;
        }

        if field.kind == FieldKind::Primary {
            // PRIMARY KEY already implies NOT NULL.
            column.add_constraint(Constraint::PrimaryKey);
        } else if !column.nullable {
            column.add_constraint(Constraint::NotNull);
        }
        if field.kind == FieldKind::ForeignKey {
            if let Some(reference) = &field.references {
                column.add_constraint(Constraint::ForeignKey {
                    table: reference.table.clone(),
                    column: reference.column.clone(),
                });
            }
        }

        columns.push(column);
    }

    let mut table = Table::new(schema, table_name);
    table.columns = columns;
    table.indexes = indexes;

    Ok(PreparedModel { descriptor, table })
}

/// Snake-case a model or field name (`OrderLine` → `order_line`).
pub fn snake_case(name: &str) -> String {
    name.to_case(Case::Snake)
}

/// Naive English pluralization for default table names.
pub fn pluralize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix('y') {
        let penultimate = stem.chars().last();
        if penultimate.is_some_and(|c| !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')) {
            return format!("{stem}ies");
        }
    }
    if name.ends_with('s')
        || name.ends_with('x')
        || name.ends_with('z')
        || name.ends_with("ch")
        || name.ends_with("sh")
    {
        return format!("{name}es");
    }
    format!("{name}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldDescriptor;
    use crate::value::ValueType;

    fn config() -> StoreConfig {
        StoreConfig::builder("postgres://localhost/test").build()
    }

    fn product_descriptor() -> ModelDescriptor {
        ModelDescriptor::new("Product")
            .field(FieldDescriptor::new(
                "id",
                FieldKind::Primary,
                ValueType::Int64,
            ))
            .field(
                FieldDescriptor::new("sku", FieldKind::Attribute, ValueType::Text)
                    .tag("unique;index"),
            )
            .field(
                FieldDescriptor::new("note", FieldKind::Attribute, ValueType::Text).nullable(),
            )
            .field(
                FieldDescriptor::new("vendor_id", FieldKind::ForeignKey, ValueType::Int64)
                    .references("vendors", "id"),
            )
            .field(FieldDescriptor::new(
                "orders",
                FieldKind::RelationshipMultiple,
                ValueType::Int64,
            ))
            .field(
                FieldDescriptor::new("scratch", FieldKind::Attribute, ValueType::Json).tag("-"),
            )
    }

    fn prepare_product() -> (ModelRegistry, Arc<PreparedModel>) {
        let mut registry = ModelRegistry::new();
        let types = TypeRegistry::with_builtins();
        let tags = TagSetterRegistry::with_builtins();
        let prepared = registry
            .prepare(&config(), &types, &tags, product_descriptor())
            .unwrap();
        (registry, prepared)
    }

    #[test]
    fn test_prepare_builds_expected_columns() {
        let (_, prepared) = prepare_product();
        let table = prepared.table();

        assert_eq!(table.schema, "public");
        assert_eq!(table.name, "products");
        // Relationship and omitted fields carry no column.
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "sku", "note", "vendor_id"]);

        let id = table.column("id").unwrap();
        assert_eq!(id.sql_type.as_deref(), Some("bigserial"));
        assert!(id.is_primary());
        assert!(!id.has_not_null());

        let sku = table.column("sku").unwrap();
        assert!(sku.has_not_null());
        assert!(sku.constraints.contains(&Constraint::Unique));

        let note = table.column("note").unwrap();
        assert!(note.nullable);
        assert!(!note.has_not_null());

        let vendor = table.column("vendor_id").unwrap();
        assert!(vendor.constraints.iter().any(|c| matches!(
            c,
            Constraint::ForeignKey { table, column } if table == "vendors" && column == "id"
        )));
    }

    #[test]
    fn test_prepare_twice_is_idempotent() {
        let (mut registry, first) = prepare_product();
        let types = TypeRegistry::with_builtins();
        let tags = TagSetterRegistry::with_builtins();
        let second = registry
            .prepare(&config(), &types, &tags, product_descriptor())
            .unwrap();

        // Same allocation: tag setters did not run again.
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.names(), vec!["Product"]);
    }

    #[test]
    fn test_index_from_tag_lands_on_table() {
        let (_, prepared) = prepare_product();
        let indexes = &prepared.table().indexes;
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name, "idx_products_sku");
        assert_eq!(indexes[0].columns, vec!["sku"]);
    }

    #[test]
    fn test_state_machine_is_monotonic() {
        let (mut registry, _) = prepare_product();
        assert_eq!(registry.state("Product"), Some(MigrationState::Prepared));

        registry.advance_state("Product", MigrationState::TableMigrated);
        assert_eq!(
            registry.state("Product"),
            Some(MigrationState::TableMigrated)
        );

        // Moving backwards is a no-op.
        registry.advance_state("Product", MigrationState::Prepared);
        assert_eq!(
            registry.state("Product"),
            Some(MigrationState::TableMigrated)
        );

        registry.advance_state("Product", MigrationState::ConstraintsMigrated);
        assert_eq!(
            registry.state("Product"),
            Some(MigrationState::ConstraintsMigrated)
        );
    }

    #[test]
    fn test_schema_and_table_overrides() {
        let mut registry = ModelRegistry::new();
        let types = TypeRegistry::with_builtins();
        let tags = TagSetterRegistry::with_builtins();
        let descriptor = ModelDescriptor::new("Person")
            .schema("app")
            .table("people")
            .field(FieldDescriptor::new(
                "id",
                FieldKind::Primary,
                ValueType::Int32,
            ));
        let prepared = registry
            .prepare(&config(), &types, &tags, descriptor)
            .unwrap();

        assert_eq!(prepared.table().schema, "app");
        assert_eq!(prepared.table().name, "people");
        assert_eq!(
            prepared.table().column("id").unwrap().sql_type.as_deref(),
            Some("serial")
        );
    }

    #[test]
    fn test_invalid_table_override_rejected() {
        let mut registry = ModelRegistry::new();
        let types = TypeRegistry::with_builtins();
        let tags = TagSetterRegistry::with_builtins();
        let descriptor = ModelDescriptor::new("Person")
            .table("People")
            .field(FieldDescriptor::new(
                "id",
                FieldKind::Primary,
                ValueType::Int32,
            ));
        assert!(registry.prepare(&config(), &types, &tags, descriptor).is_err());
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("OrderLine"), "order_line");
        assert_eq!(snake_case("UserAccount"), "user_account");
        assert_eq!(snake_case("id"), "id");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("product"), "products");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("batch"), "batches");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("status"), "statuses");
    }
}
