// Project Definition Loader
// Reads YAML or JSON project files into ProjectDefinition

use crate::parser::error::{ParseError, ParseResult};
use crate::parser::models::ProjectDefinition;

use std::fs;
use std::path::Path;

/// Loader for project definition files
pub struct ProjectLoader;

impl ProjectLoader {
    /// Parse a project definition from YAML
    pub fn parse(content: &str) -> ParseResult<ProjectDefinition> {
        serde_yaml::from_str(content).map_err(|e| ParseError::from_yaml_error(&e, content))
    }

    /// Parse a project definition from JSON
    pub fn parse_json(content: &str) -> ParseResult<ProjectDefinition> {
        serde_json::from_str(content).map_err(|e| ParseError::from_json_error(&e, content))
    }

    /// Parse a project definition file; `.json` files are read as JSON, anything else as YAML
    pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<ProjectDefinition> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ParseError::io(format!("failed to read {}: {}", path.display(), e)))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let definition = if is_json {
            Self::parse_json(&content)?
        } else {
            Self::parse(&content)?
        };

        tracing::debug!(
            path = %path.display(),
            axes = definition.axes.len(),
            matrices = definition.matrices.len(),
            variants = definition.build_variants.len(),
            "loaded project definition"
        );

        Ok(definition)
    }
}
