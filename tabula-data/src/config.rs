//! Data-layer configuration.
//!
//! Read from the `data:` section of a YAML document, then overlaid with
//! `TABULA_DATA_*` environment variables:
//!
//! ```yaml
//! data:
//!   dialect: postgres
//!   identifier_policy: quote
//!   default_per_page: 25
//!   max_per_page: 100
//! ```

use crate::error::DataError;
use crate::query::{Dialect, IdentifierPolicy};
use serde::Deserialize;
use std::path::Path;

const ENV_DIALECT: &str = "TABULA_DATA_DIALECT";
const ENV_IDENTIFIER_POLICY: &str = "TABULA_DATA_IDENTIFIER_POLICY";
const ENV_DEFAULT_PER_PAGE: &str = "TABULA_DATA_DEFAULT_PER_PAGE";
const ENV_MAX_PER_PAGE: &str = "TABULA_DATA_MAX_PER_PAGE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dialect: Dialect,
    pub identifier_policy: IdentifierPolicy,
    /// Page size used when a caller asks for zero rows per page.
    pub default_per_page: u64,
    /// Upper bound on page sizes and split limits.
    pub max_per_page: Option<u64>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Generic,
            identifier_policy: IdentifierPolicy::Validate,
            default_per_page: 20,
            max_per_page: None,
        }
    }
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    data: Option<DataConfig>,
}

impl DataConfig {
    /// Parse the `data:` section of a YAML document. A document without one
    /// yields the defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DataError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let doc: Document =
            serde_yaml::from_str(yaml).map_err(|e| DataError::Config(e.to_string()))?;
        Ok(doc.data.unwrap_or_default())
    }

    /// Read a YAML file. A missing file yields the defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| DataError::Config(e.to_string()))?;
        Self::from_yaml_str(&content)
    }

    /// Read a YAML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        Self::from_yaml_file(path)?.with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self, DataError> {
        if let Ok(value) = std::env::var(ENV_DIALECT) {
            self.dialect = parse_enum(ENV_DIALECT, &value)?;
        }
        if let Ok(value) = std::env::var(ENV_IDENTIFIER_POLICY) {
            self.identifier_policy = parse_enum(ENV_IDENTIFIER_POLICY, &value)?;
        }
        if let Ok(value) = std::env::var(ENV_DEFAULT_PER_PAGE) {
            self.default_per_page = parse_u64(ENV_DEFAULT_PER_PAGE, &value)?;
        }
        if let Ok(value) = std::env::var(ENV_MAX_PER_PAGE) {
            self.max_per_page = Some(parse_u64(ENV_MAX_PER_PAGE, &value)?);
        }
        Ok(self)
    }

    /// Effective page size for a requested one.
    pub fn per_page(&self, requested: u64) -> u64 {
        let size = if requested == 0 {
            self.default_per_page
        } else {
            requested
        };
        match self.max_per_page {
            Some(max) => size.min(max),
            None => size,
        }
    }
}

fn parse_enum<T: serde::de::DeserializeOwned>(key: &str, value: &str) -> Result<T, DataError> {
    serde_yaml::from_str(&value.trim().to_lowercase())
        .map_err(|_| DataError::Config(format!("{key}: unrecognized value '{value}'")))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, DataError> {
    value
        .trim()
        .parse()
        .map_err(|_| DataError::Config(format!("{key}: expected an unsigned integer, got '{value}'")))
}
