//! Configuration for the model store.
//!
//! Provides a builder pattern for configuring the store.

/// Configuration for the model store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL database URL.
    pub database_url: String,
    /// Schema used when a model carries no schema override (default: "public").
    pub default_schema: String,
    /// Auto-include unselected NOT NULL columns with their zero value on
    /// insert, instead of letting the driver reject the row (default: true).
    pub fill_not_null: bool,
    /// Name of the lazily created catalog view used for constraint
    /// introspection (default: "__pgmodel_constraints").
    pub constraint_view: String,
}

impl StoreConfig {
    /// Create a new configuration builder.
    pub fn builder(database_url: impl Into<String>) -> StoreConfigBuilder {
        StoreConfigBuilder::new(database_url)
    }
}

/// Builder for [`StoreConfig`].
#[derive(Debug)]
pub struct StoreConfigBuilder {
    database_url: String,
    default_schema: String,
    fill_not_null: bool,
    constraint_view: String,
}

impl StoreConfigBuilder {
    /// Create a new builder with the database URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            default_schema: "public".to_string(),
            fill_not_null: true,
            constraint_view: "__pgmodel_constraints".to_string(),
        }
    }

    /// Set the default schema name (default: "public").
    pub fn default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    /// Enable or disable zero-filling of unselected NOT NULL columns
    /// (default: true).
    pub fn fill_not_null(mut self, enabled: bool) -> Self {
        self.fill_not_null = enabled;
        self
    }

    /// Set the constraint-introspection view name
    /// (default: "__pgmodel_constraints").
    pub fn constraint_view(mut self, name: impl Into<String>) -> Self {
        self.constraint_view = name.into();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> StoreConfig {
        StoreConfig {
            database_url: self.database_url,
            default_schema: self.default_schema,
            fill_not_null: self.fill_not_null,
            constraint_view: self.constraint_view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = StoreConfig::builder("postgres://localhost/test").build();
        assert_eq!(config.database_url, "postgres://localhost/test");
        assert_eq!(config.default_schema, "public");
        assert!(config.fill_not_null);
        assert_eq!(config.constraint_view, "__pgmodel_constraints");
    }

    #[test]
    fn test_builder_overrides() {
        let config = StoreConfig::builder("postgres://localhost/test")
            .default_schema("app")
            .fill_not_null(false)
            .constraint_view("__constraints")
            .build();
        assert_eq!(config.default_schema, "app");
        assert!(!config.fill_not_null);
        assert_eq!(config.constraint_view, "__constraints");
    }
}
