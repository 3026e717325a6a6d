//! Tag-setter registry: declarative tag key/value pairs mutating a column
//! during model preparation.
//!
//! Built-in setters cover `name`, `index`, `type`, `notnull` and `unique`.
//! Unknown tag keys are traced and ignored so model-layer-only tags stay
//! forward compatible.

use std::collections::HashMap;

use regex::Regex;

use crate::datatype::TypeRegistry;
use crate::error::{Result, StoreError};
use crate::model::{FieldDescriptor, ModelDescriptor};
use crate::table::{Column, Index, IndexMethod};

/// Everything a setter may inspect or mutate while applying one tag.
pub struct TagContext<'a> {
    pub model: &'a ModelDescriptor,
    pub field: &'a FieldDescriptor,
    /// Final table name, known before columns are built.
    pub table_name: &'a str,
    /// The tag's `=`-value, if any.
    pub value: Option<&'a str>,
    pub column: &'a mut Column,
    /// Table-level index list, deduplicated by name.
    pub indexes: &'a mut Vec<Index>,
    pub types: &'a TypeRegistry,
}

pub type TagSetter = fn(&mut TagContext<'_>) -> Result<()>;

/// Registry of tag setters, written once at startup and read-only afterwards.
#[derive(Default)]
pub struct TagSetterRegistry {
    setters: HashMap<String, TagSetter>,
}

impl TagSetterRegistry {
    /// An empty registry; most callers want [`TagSetterRegistry::with_builtins`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in setters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (key, setter) in [
            ("name", set_name as TagSetter),
            ("index", set_index),
            ("type", set_type),
            ("notnull", set_not_null),
            ("unique", set_unique),
        ] {
            registry.register(key, setter).expect("builtin tag registered twice");
        }
        registry
    }

    /// Register a setter; fails if the key is already taken (no redefinition).
    pub fn register(&mut self, key: impl Into<String>, setter: TagSetter) -> Result<()> {
        let key = key.into();
        if self.setters.contains_key(&key) {
            return Err(StoreError::internal(format!(
                "tag setter '{key}' is already registered"
            )));
        }
        self.setters.insert(key, setter);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&TagSetter> {
        self.setters.get(key)
    }
}

/// `name=<col>`: override the column name.
fn set_name(ctx: &mut TagContext<'_>) -> Result<()> {
    let value = ctx.value.ok_or_else(|| {
        StoreError::internal(format!(
            "tag 'name' on '{}.{}' requires a value",
            ctx.model.name, ctx.field.name
        ))
    })?;
    ctx.column.name = value.to_string();
    Ok(())
}

/// `index[=name][,type=btree|hash|gist|gin]`: create or augment an index on
/// the owning table, deduplicated by name.
fn set_index(ctx: &mut TagContext<'_>) -> Result<()> {
    let mut name: Option<String> = None;
    let mut method: Option<IndexMethod> = None;

    for token in ctx
        .value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        match token.split_once('=') {
            Some(("name", v)) => name = Some(v.trim().to_string()),
            Some(("type", v)) => {
                method = Some(IndexMethod::parse(v.trim()).ok_or_else(|| {
                    StoreError::internal(format!(
                        "unknown index type '{}' on '{}.{}'",
                        v, ctx.model.name, ctx.field.name
                    ))
                })?);
            }
            Some((key, _)) => {
                return Err(StoreError::internal(format!(
                    "unknown index sub-tag '{}' on '{}.{}'",
                    key, ctx.model.name, ctx.field.name
                )));
            }
            // Bare tokens are either the index type or the index name.
            None => match IndexMethod::parse(token) {
                Some(m) => method = Some(m),
                None => name = Some(token.to_string()),
            },
        }
    }

    let column_name = if ctx.column.name.is_empty() {
        crate::prepare::snake_case(&ctx.field.name)
    } else {
        ctx.column.name.clone()
    };
    let name =
        name.unwrap_or_else(|| format!("idx_{}_{}", ctx.table_name, column_name));

    match ctx.indexes.iter_mut().find(|i| i.name == name) {
        Some(existing) => {
            if !existing.columns.contains(&column_name) {
                existing.columns.push(column_name);
            }
            if let Some(method) = method {
                existing.method = method;
            }
        }
        None => {
            let mut index = Index::new(name, method.unwrap_or_default());
            index.columns.push(column_name);
            ctx.indexes.push(index);
        }
    }
    Ok(())
}

/// `type=<sqlType>(<p1>,...)`: resolve an explicit SQL type against the
/// data-type registry, keeping residual parameters for rendering.
fn set_type(ctx: &mut TagContext<'_>) -> Result<()> {
    let value = ctx.value.ok_or_else(|| {
        StoreError::internal(format!(
            "tag 'type' on '{}.{}' requires a value",
            ctx.model.name, ctx.field.name
        ))
    })?;

    let shape = Regex::new(r"^([a-zA-Z][a-zA-Z ]*?)\s*(?:\(([^)]*)\))?$").unwrap();
    let captures = shape.captures(value).ok_or_else(|| {
        StoreError::internal(format!(
            "malformed type tag '{}' on '{}.{}'",
            value, ctx.model.name, ctx.field.name
        ))
    })?;

    let type_name = captures.get(1).unwrap().as_str().trim();
    let params: Vec<String> = captures
        .get(2)
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let ty = ctx.types.get(type_name).ok_or_else(|| {
        StoreError::internal(format!(
            "unknown sql type '{}' on '{}.{}'",
            type_name, ctx.model.name, ctx.field.name
        ))
    })?;

    ctx.column.sql_type = Some(ty.render(&params)?);
    ctx.column.type_name = Some(ty.name.clone());
    ctx.column.type_params = params;
    ctx.column.external = ty.external;
    Ok(())
}

/// `notnull`: mark the column non-nullable.
fn set_not_null(ctx: &mut TagContext<'_>) -> Result<()> {
    ctx.column.nullable = false;
    ctx.column.add_constraint(crate::table::Constraint::NotNull);
    Ok(())
}

/// `unique`: add a unique constraint.
fn set_unique(ctx: &mut TagContext<'_>) -> Result<()> {
    ctx.column.add_constraint(crate::table::Constraint::Unique);
    Ok(())
}
