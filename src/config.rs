//! Translator configuration files.
//!
//! ```toml
//! quote_identifiers_in_from = false
//! key_prefix = "q"
//!
//! [operators.ne]
//! template = "{column} != {bind}"
//!
//! [operators.like]
//! template = "{column} like {bind}"
//! transform = "contains"
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{QfilterError, QfilterResult};
use crate::operators::{OperatorRegistry, TemplateOperator};
use crate::translator::FilterOptions;

/// Contents of a qfilter config file. Missing settings use the
/// [`FilterOptions`] defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(default = "default_true")]
    pub quote_identifiers_in_from: bool,

    #[serde(default = "default_true")]
    pub quote_field_identifiers: bool,

    #[serde(default)]
    pub key_prefix: Option<String>,

    /// Template operators by name.
    #[serde(default)]
    pub operators: BTreeMap<String, TemplateOperator>,
}

fn default_true() -> bool {
    true
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            quote_identifiers_in_from: true,
            quote_field_identifiers: true,
            key_prefix: None,
            operators: BTreeMap::new(),
        }
    }
}

impl FilterConfig {
    /// Parse config from TOML text.
    pub fn from_toml(text: &str) -> QfilterResult<Self> {
        toml::from_str(text).map_err(|e| QfilterError::Config(e.to_string()))
    }

    /// Read config from a file.
    pub fn load(path: impl AsRef<Path>) -> QfilterResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(
            "Loaded config from {} ({} custom operators)",
            path.display(),
            config.operators.len()
        );
        Ok(config)
    }

    /// `<config dir>/qfilter/config.toml`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("qfilter").join("config.toml"))
    }

    /// Read the per-user config file, or defaults when there is none.
    pub fn load_default() -> QfilterResult<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Build translator options, registering every configured operator.
    pub fn into_options(self) -> QfilterResult<FilterOptions> {
        let mut registry = OperatorRegistry::new();
        for (name, op) in self.operators {
            registry.register(name, op)?;
        }

        Ok(FilterOptions {
            custom_operators: registry,
            quote_identifiers_in_from: self.quote_identifiers_in_from,
            key_prefix: self.key_prefix,
            quote_field_identifiers: self.quote_field_identifiers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QfilterError;
    use crate::operators::ValueTransform;
    use crate::translator::{translate, Params};
    use serde_json::json;

    #[test]
    fn test_empty_config_is_default() {
        let config = FilterConfig::from_toml("").unwrap();
        assert!(config.quote_identifiers_in_from);
        assert!(config.quote_field_identifiers);
        assert!(config.key_prefix.is_none());
        assert!(config.operators.is_empty());
    }

    #[test]
    fn test_operators_from_toml() {
        let config = FilterConfig::from_toml(
            r#"
            quote_identifiers_in_from = false
            key_prefix = "q"

            [operators.ne]
            template = "{column} != {bind}"

            [operators.like]
            template = "{column} like {bind}"
            transform = "contains"
            "#,
        )
        .unwrap();

        assert!(!config.quote_identifiers_in_from);
        assert_eq!(config.key_prefix.as_deref(), Some("q"));
        assert_eq!(config.operators["ne"].transform, ValueTransform::None);
        assert_eq!(config.operators["like"].transform, ValueTransform::Contains);
    }

    #[test]
    fn test_config_drives_translation() {
        let options = FilterConfig::from_toml(
            r#"
            key_prefix = "q"
            [operators.ne]
            template = "{column} != {bind}"
            "#,
        )
        .unwrap()
        .into_options()
        .unwrap();

        let params: Params = serde_json::from_value(json!({
            "q.status__ne": "closed",
            "page": 3
        }))
        .unwrap();
        let q = translate(&params, &options).unwrap();
        assert_eq!(q.sql, r#"select * where "status" != :status__ne"#);
    }

    #[test]
    fn test_invalid_operator_name_in_config() {
        let config = FilterConfig::from_toml(
            r#"
            [operators."is__null"]
            template = "{column} is null"
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.into_options(),
            Err(QfilterError::InvalidOperator(_))
        ));
    }

    #[test]
    fn test_unknown_setting_rejected() {
        let err = FilterConfig::from_toml("quote_everything = true").unwrap_err();
        assert!(matches!(err, QfilterError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = FilterConfig::load("/nonexistent/qfilter/config.toml").unwrap_err();
        assert!(matches!(err, QfilterError::Io(_)));
    }
}
