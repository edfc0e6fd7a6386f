//! Configuration file loading.
//!
//! A `publications.toml` file can set project-wide defaults:
//!
//! ```toml
//! default_sort = "date"
//! template_dir = "theme/templates"
//! template_name = "publications"
//! ```
//!
//! Every key is optional. Relative `template_dir` paths are resolved
//! against the directory containing the config file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::sort::SortMode;
use crate::template::{Renderer, DEFAULT_TEMPLATE};

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Sort mode for directives without a `:sort:` option
    pub default_sort: SortMode,
    /// Theme directory searched for `<template_name>.html`
    pub template_dir: Option<PathBuf>,
    /// Theme template name, without extension
    pub template_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_sort: SortMode::default(),
            template_dir: None,
            template_name: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl Config {
    /// Loads a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        if let (Some(dir), Some(parent)) = (&config.template_dir, path.parent()) {
            if dir.is_relative() {
                config.template_dir = Some(parent.join(dir));
            }
        }
        Ok(config)
    }

    /// Parses config from TOML text. Paths are kept as written.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Builds the renderer described by this config.
    pub fn renderer(&self) -> Renderer {
        match &self.template_dir {
            Some(dir) => Renderer::with_theme_dir(dir.clone(), &self.template_name),
            None => Renderer::new().with_template_name(&self.template_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.default_sort, SortMode::ByDate);
        assert_eq!(config.template_name, "publications");
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
default_sort = "name"
template_dir = "theme"
template_name = "compact"
"#;

        let config = Config::parse(content).unwrap();

        assert_eq!(config.default_sort, SortMode::ByAuthor);
        assert_eq!(config.template_dir, Some(PathBuf::from("theme")));
        assert_eq!(config.template_name, "compact");
    }

    #[test]
    fn test_parse_invalid_sort() {
        let err = Config::parse(r#"default_sort = "popularity""#).unwrap_err();

        assert!(matches!(err, ConfigError::ParseError(_)));
        assert!(err.to_string().contains("popularity"), "got: {}", err);
    }

    #[test]
    fn test_parse_unknown_key() {
        let err = Config::parse(r#"colour = "blue""#).unwrap_err();

        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_resolves_template_dir_against_config_location() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("publications.toml");
        fs::write(&path, r#"template_dir = "theme""#).unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config.template_dir, Some(dir.path().join("theme")));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/publications.toml")).unwrap_err();

        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_renderer_uses_template_name() {
        let config = Config::parse(r#"template_name = "compact""#).unwrap();

        let renderer = config.renderer();

        assert_eq!(renderer.template_name(), "compact");
    }
}
