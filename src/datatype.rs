//! SQL data-type descriptors and the type registry.
//!
//! A [`SqlType`] produces the SQL keyword (and parameters) for a column. The
//! [`TypeRegistry`] is built once at store construction, rejects duplicate
//! keys, and resolves a field's native type to a SQL type via kind defaults.

use std::collections::HashMap;

use crate::error::{Result, StoreError};
use crate::model::{FieldDescriptor, FieldKind, ModelDescriptor};
use crate::value::ValueType;

/// How a SQL type consumes literal parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlTypeKind {
    /// Fixed keyword, no parameters (`boolean`, `bigint`).
    Basic,
    /// Keyword requiring literal parameters (`varchar(20)`).
    Parametered,
    /// Keyword with optional positional parameters
    /// (`timestamp(3) with time zone`).
    OptionalParameter,
}

/// Descriptor for one SQL type, keyed by a unique registry name.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlType {
    /// Registry key, as written in `type=` tags (e.g. "varchar").
    pub name: String,
    /// Head keyword the parameters attach to (e.g. "timestamp").
    pub keyword: String,
    /// Trailing keyword text after any parameters (e.g. "with time zone").
    pub suffix: Option<String>,
    pub kind: SqlTypeKind,
    /// Columns of this type are excluded from the inline `CREATE TABLE` list
    /// and added with their own statement after table creation.
    pub external: bool,
}

impl SqlType {
    pub fn basic(name: &str) -> Self {
        Self {
            name: name.to_string(),
            keyword: name.to_string(),
            suffix: None,
            kind: SqlTypeKind::Basic,
            external: false,
        }
    }

    pub fn parametered(name: &str) -> Self {
        Self {
            name: name.to_string(),
            keyword: name.to_string(),
            suffix: None,
            kind: SqlTypeKind::Parametered,
            external: false,
        }
    }

    pub fn optional(name: &str, keyword: &str, suffix: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            keyword: keyword.to_string(),
            suffix: suffix.map(str::to_string),
            kind: SqlTypeKind::OptionalParameter,
            external: false,
        }
    }

    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    /// Render the full SQL type text for the given literal parameters.
    pub fn render(&self, params: &[String]) -> Result<String> {
        match self.kind {
            SqlTypeKind::Basic if !params.is_empty() => Err(StoreError::internal(format!(
                "sql type '{}' takes no parameters",
                self.name
            ))),
            SqlTypeKind::Parametered if params.is_empty() => Err(StoreError::internal(format!(
                "sql type '{}' requires parameters",
                self.name
            ))),
            _ => {
                let mut rendered = self.keyword.clone();
                if !params.is_empty() {
                    rendered.push('(');
                    rendered.push_str(&params.join(","));
                    rendered.push(')');
                }
                if let Some(suffix) = &self.suffix {
                    rendered.push(' ');
                    rendered.push_str(suffix);
                }
                Ok(rendered)
            }
        }
    }
}

/// Registry of SQL types, written once at startup and read-only afterwards.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, SqlType>,
}

impl TypeRegistry {
    /// An empty registry; most callers want [`TypeRegistry::with_builtins`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the PostgreSQL types the kind defaults and
    /// `type=` tags rely on.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for ty in [
            SqlType::basic("boolean"),
            SqlType::basic("smallint"),
            SqlType::basic("integer"),
            SqlType::basic("bigint"),
            SqlType::basic("serial"),
            SqlType::basic("bigserial"),
            SqlType::basic("real"),
            SqlType::basic("double precision"),
            SqlType::basic("text"),
            SqlType::basic("date"),
            SqlType::basic("uuid"),
            SqlType::basic("json"),
            SqlType::basic("jsonb"),
            SqlType::basic("bytea"),
            SqlType::parametered("varchar"),
            SqlType::parametered("char"),
            SqlType::optional("numeric", "numeric", None),
            SqlType::optional("timestamp", "timestamp", None),
            SqlType::optional("timestamptz", "timestamp", Some("with time zone")),
            SqlType::optional("time", "time", None),
            SqlType::basic("tsvector").external(),
        ] {
            // Builtin names are distinct; a collision here is a bug.
            registry
                .register(ty)
                .expect("builtin sql type registered twice");
        }
        registry
    }

    /// Register a type; fails if the key is already taken (no overwrite).
    pub fn register(&mut self, ty: SqlType) -> Result<()> {
        if self.types.contains_key(&ty.name) {
            return Err(StoreError::internal(format!(
                "sql type '{}' is already registered",
                ty.name
            )));
        }
        self.types.insert(ty.name.clone(), ty);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SqlType> {
        self.types.get(name)
    }

    /// Resolve a field's SQL type from its kind and native type.
    ///
    /// Primary-key integer fields resolve to auto-increment types, 4-byte or
    /// 8-byte by underlying width; everything else follows the kind-default
    /// map. Fails with an internal error naming the model and field when the
    /// registry is missing the default type.
    pub fn resolve(&self, model: &ModelDescriptor, field: &FieldDescriptor) -> Result<&SqlType> {
        let name = if field.kind == FieldKind::Primary && field.value_type.is_integer() {
            match field.value_type {
                ValueType::Int64 => "bigserial",
                _ => "serial",
            }
        } else {
            match field.value_type {
                ValueType::Bool => "boolean",
                ValueType::Int16 => "smallint",
                ValueType::Int32 => "integer",
                ValueType::Int64 => "bigint",
                ValueType::Float32 => "real",
                ValueType::Float64 => "double precision",
                ValueType::Text => "text",
                ValueType::Timestamp => "timestamptz",
                ValueType::Decimal => "numeric",
                ValueType::Uuid => "uuid",
                ValueType::Json => "jsonb",
            }
        };

        self.get(name).ok_or_else(|| {
            StoreError::internal(format!(
                "unresolved data type for '{}.{}': sql type '{}' is not registered",
                model.name, field.name, name
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with(field: FieldDescriptor) -> (ModelDescriptor, FieldDescriptor) {
        let model = ModelDescriptor::new("Sample").field(field.clone());
        (model, field)
    }

    #[test]
    fn test_render_basic() {
        let ty = SqlType::basic("boolean");
        assert_eq!(ty.render(&[]).unwrap(), "boolean");
        assert!(ty.render(&["1".to_string()]).is_err());
    }

    #[test]
    fn test_render_parametered() {
        let ty = SqlType::parametered("varchar");
        assert_eq!(ty.render(&["20".to_string()]).unwrap(), "varchar(20)");
        assert!(ty.render(&[]).is_err());
    }

    #[test]
    fn test_render_optional_parameter() {
        let ty = SqlType::optional("timestamptz", "timestamp", Some("with time zone"));
        assert_eq!(ty.render(&[]).unwrap(), "timestamp with time zone");
        assert_eq!(
            ty.render(&["3".to_string()]).unwrap(),
            "timestamp(3) with time zone"
        );
    }

    #[test]
    fn test_render_numeric_with_params() {
        let registry = TypeRegistry::with_builtins();
        let numeric = registry.get("numeric").unwrap();
        assert_eq!(
            numeric
                .render(&["10".to_string(), "2".to_string()])
                .unwrap(),
            "numeric(10,2)"
        );
        assert_eq!(numeric.render(&[]).unwrap(), "numeric");
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = TypeRegistry::new();
        registry.register(SqlType::basic("text")).unwrap();
        assert!(registry.register(SqlType::basic("text")).is_err());
    }

    #[test]
    fn test_resolve_kind_defaults() {
        let registry = TypeRegistry::with_builtins();
        for (vt, expected) in [
            (ValueType::Bool, "boolean"),
            (ValueType::Int16, "smallint"),
            (ValueType::Int32, "integer"),
            (ValueType::Int64, "bigint"),
            (ValueType::Float32, "real"),
            (ValueType::Float64, "double precision"),
            (ValueType::Text, "text"),
            (ValueType::Timestamp, "timestamptz"),
            (ValueType::Decimal, "numeric"),
            (ValueType::Uuid, "uuid"),
            (ValueType::Json, "jsonb"),
        ] {
            let (model, field) =
                model_with(FieldDescriptor::new("f", FieldKind::Attribute, vt));
            assert_eq!(registry.resolve(&model, &field).unwrap().name, expected);
        }
    }

    #[test]
    fn test_resolve_primary_key_serial_by_width() {
        let registry = TypeRegistry::with_builtins();
        let (model, field) =
            model_with(FieldDescriptor::new("id", FieldKind::Primary, ValueType::Int64));
        assert_eq!(registry.resolve(&model, &field).unwrap().name, "bigserial");

        let (model, field) =
            model_with(FieldDescriptor::new("id", FieldKind::Primary, ValueType::Int32));
        assert_eq!(registry.resolve(&model, &field).unwrap().name, "serial");
    }

    #[test]
    fn test_resolve_primary_key_non_integer_keeps_default() {
        let registry = TypeRegistry::with_builtins();
        let (model, field) =
            model_with(FieldDescriptor::new("id", FieldKind::Primary, ValueType::Uuid));
        assert_eq!(registry.resolve(&model, &field).unwrap().name, "uuid");
    }

    #[test]
    fn test_resolve_names_model_and_field_on_failure() {
        let registry = TypeRegistry::new(); // no builtins
        let (model, field) =
            model_with(FieldDescriptor::new("sku", FieldKind::Attribute, ValueType::Text));
        let err = registry.resolve(&model, &field).unwrap_err();
        assert!(err.to_string().contains("Sample.sku"));
    }

    #[test]
    fn test_external_builtin() {
        let registry = TypeRegistry::with_builtins();
        assert!(registry.get("tsvector").unwrap().external);
        assert!(!registry.get("text").unwrap().external);
    }
}
