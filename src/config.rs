//! Conversion options.
//!
//! Options are plain data. They can be built in code or loaded from a TOML
//! file:
//!
//! ```toml
//! strict_methods = true
//! max_depth = 16
//! fk_template = "{table}_id"
//! client_name = "supabase"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "querybridge.toml";

/// Options shared by every conversion direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Reject unknown DSL methods instead of ignoring them with a warning.
    pub strict_methods: bool,

    /// Largest accepted input, in bytes.
    pub max_input_len: usize,

    /// Deepest accepted bracket nesting.
    pub max_depth: usize,

    /// Foreign-key column assumed for embeds. `{table}` is the parent table.
    pub fk_template: String,

    /// Primary-key column of the parent table.
    pub primary_key: String,

    /// Client identifier used when rendering DSL chains.
    pub client_name: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            strict_methods: false,
            max_input_len: 64 * 1024,
            max_depth: 32,
            fk_template: "{table}_id".to_string(),
            primary_key: "id".to_string(),
            client_name: "supabase".to_string(),
        }
    }
}

impl ConvertOptions {
    pub fn builder() -> ConvertOptionsBuilder {
        ConvertOptionsBuilder::default()
    }

    /// Load options from a TOML file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load the first config found: `./querybridge.toml`, then
    /// `<config dir>/querybridge/config.toml`. Defaults when neither exists.
    pub fn discover() -> Result<Self, ConfigError> {
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => {
                tracing::debug!("loading config from {}", path.display());
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Candidate config files, in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("querybridge").join("config.toml"));
        }
        paths
    }
}

/// Builder for [`ConvertOptions`].
#[derive(Debug, Default)]
pub struct ConvertOptionsBuilder {
    options: ConvertOptions,
}

impl ConvertOptionsBuilder {
    pub fn strict_methods(mut self, strict: bool) -> Self {
        self.options.strict_methods = strict;
        self
    }

    pub fn max_input_len(mut self, len: usize) -> Self {
        self.options.max_input_len = len;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.options.max_depth = depth;
        self
    }

    /// Set the foreign-key template, e.g. `{table}_id` or `fk_{table}`.
    pub fn fk_template(mut self, template: impl Into<String>) -> Self {
        self.options.fk_template = template.into();
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.options.primary_key = column.into();
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.options.client_name = name.into();
        self
    }

    pub fn build(self) -> ConvertOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConvertOptions::default();
        assert!(!options.strict_methods);
        assert_eq!(options.max_input_len, 65536);
        assert_eq!(options.max_depth, 32);
        assert_eq!(options.fk_template, "{table}_id");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let options = ConvertOptions::from_toml("strict_methods = true\nmax_depth = 4\n").unwrap();
        assert!(options.strict_methods);
        assert_eq!(options.max_depth, 4);
        assert_eq!(options.primary_key, "id");
    }

    #[test]
    fn test_invalid_toml() {
        let err = ConvertOptions::from_toml("max_depth = \"deep\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_builder() {
        let options = ConvertOptions::builder()
            .strict_methods(true)
            .fk_template("fk_{table}")
            .client_name("db")
            .build();
        assert!(options.strict_methods);
        assert_eq!(options.fk_template, "fk_{table}");
        assert_eq!(options.client_name, "db");
    }
}
