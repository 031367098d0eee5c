//! Column alias resolution.
//!
//! A [`ColumnTable`] maps human-readable column aliases (`ifDescr`) to the
//! object identifiers walked on the device (`1.3.6.1.2.1.2.2.1.2`). It is
//! loaded once at startup and shared read-only by every host task.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

/// Bundled IF-MIB mapping used when no table path is configured.
pub const BUNDLED_IF_MIB: &str = include_str!("../share/IF-MIB.yaml");

/// Errors raised while loading or querying a column table.
#[derive(Debug, Error)]
pub enum ColumnError {
    /// Mapping file could not be read.
    #[error("failed to read column table: {0}")]
    Io(#[from] std::io::Error),

    /// Mapping file is not a flat alias-to-identifier YAML map.
    #[error("failed to parse column table: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Alias is absent from the table.
    #[error("unknown column alias: '{0}'")]
    UnknownAlias(String),
}

/// Immutable alias-to-identifier table.
#[derive(Debug, Clone, Default)]
pub struct ColumnTable {
    entries: HashMap<String, String>,
}

impl ColumnTable {
    /// Load a table from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ColumnError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a table from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ColumnError> {
        let entries: HashMap<String, String> = serde_yaml::from_str(content)?;
        Ok(Self { entries })
    }

    /// The bundled IF-MIB table.
    pub fn bundled() -> Result<Self, ColumnError> {
        Self::from_yaml(BUNDLED_IF_MIB)
    }

    /// Load from `path` when given, otherwise fall back to the bundled table.
    pub fn load_or_bundled(path: Option<&Path>) -> Result<Self, ColumnError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::bundled(),
        }
    }

    /// Resolve an alias to its protocol identifier.
    pub fn resolve(&self, alias: &str) -> Result<&str, ColumnError> {
        self.entries
            .get(alias)
            .map(String::as_str)
            .ok_or_else(|| ColumnError::UnknownAlias(alias.to_string()))
    }

    /// Aliases from `aliases` that the table cannot resolve.
    pub fn unknown<'a>(&self, aliases: &'a [String]) -> Vec<&'a str> {
        aliases
            .iter()
            .filter(|a| !self.entries.contains_key(a.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for ColumnTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
