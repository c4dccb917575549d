// Axis Selectors
// Id-or-tag matching used by exclude rules, task rules and matrix dependency selectors

use crate::axis::AxisRegistry;
use crate::error::{ExpansionError, ExpansionResult};
use crate::parser::models::{AxisValue, SelectorMap};

/// A single compiled selector key for one axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisSelector {
    /// Matches the value with this id
    ByValue(String),
    /// Matches every value carrying this tag
    ByTag(String),
    /// Matches any value
    Wildcard,
}

impl AxisSelector {
    /// Syntactic form of a key: `*` is the wildcard, `.tag` forces a tag,
    /// anything else is taken as a value id until the registry says otherwise.
    pub fn parse(key: &str) -> Self {
        if key == "*" {
            AxisSelector::Wildcard
        } else if let Some(tag) = key.strip_prefix('.') {
            AxisSelector::ByTag(tag.to_string())
        } else {
            AxisSelector::ByValue(key.to_string())
        }
    }

    pub fn matches(&self, value: &AxisValue) -> bool {
        match self {
            AxisSelector::ByValue(id) => value.id == *id,
            AxisSelector::ByTag(tag) => value.tags.contains(tag),
            AxisSelector::Wildcard => true,
        }
    }
}

/// Compiled partial mapping over the axes of one matrix.
///
/// Each entry pairs an axis position in the matrix with the alternatives
/// accepted for that axis. An empty selector matches every cell.
#[derive(Debug, Clone, Default)]
pub struct CellSelector {
    keys: Vec<(usize, Vec<AxisSelector>)>,
}

impl CellSelector {
    pub fn compile(
        registry: &AxisRegistry,
        matrix: &str,
        axes: &[String],
        map: &SelectorMap,
    ) -> ExpansionResult<Self> {
        let mut keys = Vec::with_capacity(map.len());

        for (axis, value) in map {
            let Some(position) = axes.iter().position(|name| name == axis) else {
                // Unknown axes are reported as such; known ones are a structural mistake
                registry.axis(axis)?;
                return Err(ExpansionError::invalid_matrix(
                    matrix,
                    format!("selector references axis '{}' which is not part of the matrix", axis),
                ));
            };

            if value.keys().is_empty() {
                return Err(ExpansionError::invalid_matrix(
                    matrix,
                    format!("selector for axis '{}' lists no values", axis),
                ));
            }

            let mut alternatives = Vec::new();
            for key in value.keys() {
                alternatives.extend(registry.compile_key(axis, key)?);
            }
            keys.push((position, alternatives));
        }

        Ok(Self { keys })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// `cell` holds the selected value for each matrix axis, in matrix order
    pub fn matches(&self, cell: &[&AxisValue]) -> bool {
        self.keys.iter().all(|(position, alternatives)| {
            cell.get(*position)
                .is_some_and(|value| alternatives.iter().any(|s| s.matches(value)))
        })
    }
}
