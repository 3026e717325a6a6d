//! Model and field descriptors supplied by the reflection layer.
//!
//! These types are the read-only input to schema preparation and the CRUD
//! builders. A `Record` holds one row of values positionally parallel to the
//! descriptor's field list.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::value::{SqlValue, ValueType};

/// Role a field plays in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    /// Primary key field.
    Primary,
    /// Plain attribute stored in its own column.
    Attribute,
    /// Foreign key referencing another model's primary key.
    ForeignKey,
    /// To-one relationship; no column of its own.
    RelationshipSingle,
    /// To-many relationship; no column of its own.
    RelationshipMultiple,
}

impl FieldKind {
    /// Whether fields of this kind are backed by a table column.
    pub fn has_column(self) -> bool {
        matches!(
            self,
            FieldKind::Primary | FieldKind::Attribute | FieldKind::ForeignKey
        )
    }

    pub fn is_relationship(self) -> bool {
        matches!(
            self,
            FieldKind::RelationshipSingle | FieldKind::RelationshipMultiple
        )
    }
}

/// Target of a foreign-key field, supplied by the reflection layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignRef {
    pub table: String,
    pub column: String,
}

/// One declarative tag: a key with an optional `=`-separated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: Option<String>,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            key: key.into(),
            value: value.map(str::to_string),
        }
    }

    /// Parse a raw `;`-separated tag string, e.g. `"name=sku;notnull;unique"`.
    ///
    /// Only the first `=` splits key from value, so values themselves may
    /// contain `=` (the `index` tag uses `name=`/`type=` sub-values).
    pub fn parse_list(raw: &str) -> Vec<Tag> {
        raw.split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((key, value)) => Tag::new(key.trim(), Some(value.trim())),
                None => Tag::new(part, None),
            })
            .collect()
    }
}

/// Description of one model field: name, kind, native type, tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub value_type: ValueType,
    /// Whether the native representation is nullable (pointer/Option-wrapped).
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Referenced table/column for `ForeignKey` fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignRef>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            kind,
            value_type,
            nullable: false,
            tags: Vec::new(),
            references: None,
        }
    }

    /// Mark the field's native type as nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Append tags parsed from a raw tag string.
    pub fn tag(mut self, raw: &str) -> Self {
        self.tags.extend(Tag::parse_list(raw));
        self
    }

    /// Set the foreign-key target.
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignRef {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    /// Whether the field is tagged `-` (omitted from the database).
    pub fn is_omitted(&self) -> bool {
        self.tags.iter().any(|t| t.key == "-")
    }
}

/// Description of one model: name, optional schema/table overrides, fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    pub fields: Vec<FieldDescriptor>,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema_name: None,
            table_name: None,
            fields: Vec::new(),
        }
    }

    /// Override the schema name (default: the store's configured schema).
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema_name = Some(schema.into());
        self
    }

    /// Override the table name (default: pluralized snake-case model name).
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    /// Append a field; declaration order is preserved and drives column order.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// The primary-key field and its declaration index, if any.
    pub fn primary(&self) -> Option<(usize, &FieldDescriptor)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.kind == FieldKind::Primary)
    }

    /// Declaration index of the field named `name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// One row of values, positionally parallel to a model's field list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    values: Vec<SqlValue>,
}

impl Record {
    /// A record with every field at its zero value (NULL for nullable fields).
    pub fn zeroed(model: &ModelDescriptor) -> Self {
        let values = model
            .fields
            .iter()
            .map(|f| {
                if f.nullable {
                    SqlValue::Null(f.value_type)
                } else {
                    f.value_type.zero()
                }
            })
            .collect();
        Self { values }
    }

    /// A record from explicit values; must match the model's field count.
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&SqlValue> {
        self.values
            .get(index)
            .ok_or_else(|| StoreError::internal(format!("record has no field at index {index}")))
    }

    pub fn set(&mut self, index: usize, value: SqlValue) -> Result<()> {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StoreError::internal(format!(
                "record has no field at index {index}"
            ))),
        }
    }

    /// The primary-key value, per the model's field layout.
    pub fn primary_value(&self, model: &ModelDescriptor) -> Result<&SqlValue> {
        let (index, _) = model.primary().ok_or_else(|| {
            StoreError::internal(format!("model '{}' has no primary key", model.name))
        })?;
        self.get(index)
    }

    /// Set the primary-key value, per the model's field layout.
    pub fn set_primary(&mut self, model: &ModelDescriptor, value: SqlValue) -> Result<()> {
        let (index, _) = model.primary().ok_or_else(|| {
            StoreError::internal(format!("model '{}' has no primary key", model.name))
        })?;
        self.set(index, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_model() -> ModelDescriptor {
        ModelDescriptor::new("Product")
            .field(FieldDescriptor::new(
                "id",
                FieldKind::Primary,
                ValueType::Int64,
            ))
            .field(FieldDescriptor::new(
                "sku",
                FieldKind::Attribute,
                ValueType::Text,
            ))
            .field(
                FieldDescriptor::new("note", FieldKind::Attribute, ValueType::Text).nullable(),
            )
            .field(FieldDescriptor::new(
                "orders",
                FieldKind::RelationshipMultiple,
                ValueType::Int64,
            ))
    }

    #[test]
    fn test_tag_parse_list() {
        let tags = Tag::parse_list("name=sku;notnull;unique");
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0], Tag::new("name", Some("sku")));
        assert_eq!(tags[1], Tag::new("notnull", None));
        assert_eq!(tags[2], Tag::new("unique", None));
    }

    #[test]
    fn test_tag_parse_value_keeps_inner_equals() {
        let tags = Tag::parse_list("index=idx_sku,type=gin");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].key, "index");
        assert_eq!(tags[0].value.as_deref(), Some("idx_sku,type=gin"));
    }

    #[test]
    fn test_tag_parse_empty_segments() {
        assert!(Tag::parse_list("").is_empty());
        assert_eq!(Tag::parse_list(";;notnull;").len(), 1);
    }

    #[test]
    fn test_field_kind_columns() {
        assert!(FieldKind::Primary.has_column());
        assert!(FieldKind::ForeignKey.has_column());
        assert!(!FieldKind::RelationshipSingle.has_column());
        assert!(FieldKind::RelationshipMultiple.is_relationship());
    }

    #[test]
    fn test_omitted_field() {
        let field =
            FieldDescriptor::new("cache", FieldKind::Attribute, ValueType::Json).tag("-");
        assert!(field.is_omitted());
    }

    #[test]
    fn test_model_primary_lookup() {
        let model = product_model();
        let (index, field) = model.primary().unwrap();
        assert_eq!(index, 0);
        assert_eq!(field.name, "id");
        assert_eq!(model.field_index("sku"), Some(1));
        assert_eq!(model.field_index("missing"), None);
    }

    #[test]
    fn test_zeroed_record() {
        let model = product_model();
        let record = Record::zeroed(&model);
        assert_eq!(record.len(), 4);
        assert_eq!(record.get(0).unwrap(), &SqlValue::BigInt(0));
        assert_eq!(record.get(1).unwrap(), &SqlValue::Text(String::new()));
        // Nullable field zeroes to NULL, not to the type's zero.
        assert_eq!(record.get(2).unwrap(), &SqlValue::Null(ValueType::Text));
    }

    #[test]
    fn test_primary_value_roundtrip() {
        let model = product_model();
        let mut record = Record::zeroed(&model);
        record.set_primary(&model, SqlValue::BigInt(42)).unwrap();
        assert_eq!(record.primary_value(&model).unwrap(), &SqlValue::BigInt(42));
    }

    #[test]
    fn test_descriptor_serialization() {
        let model = product_model();
        let json = serde_json::to_string(&model).unwrap();
        let back: ModelDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
    }
}
