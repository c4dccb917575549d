// Axis Registry
// Holds named axes and their ordered values; immutable once built

use crate::error::{DefinitionKind, ExpansionError, ExpansionResult};
use crate::parser::models::{AxisDefinition, AxisValue};
use crate::selector::AxisSelector;

use std::collections::HashMap;

/// Lookup structure over a project's axes
#[derive(Debug, Clone, Default)]
pub struct AxisRegistry {
    axes: Vec<AxisDefinition>,
    /// Quick lookup of axis index by name
    axis_indices: HashMap<String, usize>,
    /// Per axis, value index by id
    value_indices: Vec<HashMap<String, usize>>,
}

impl AxisRegistry {
    /// Build a registry, rejecting duplicate axis names and duplicate value ids
    pub fn from_definitions(axes: &[AxisDefinition]) -> ExpansionResult<Self> {
        let mut axis_indices = HashMap::with_capacity(axes.len());
        let mut value_indices = Vec::with_capacity(axes.len());

        for (i, axis) in axes.iter().enumerate() {
            if axis_indices.insert(axis.name.clone(), i).is_some() {
                return Err(ExpansionError::duplicate(DefinitionKind::Axis, &axis.name));
            }

            let mut values = HashMap::with_capacity(axis.values.len());
            for (j, value) in axis.values.iter().enumerate() {
                if values.insert(value.id.clone(), j).is_some() {
                    return Err(ExpansionError::duplicate(
                        DefinitionKind::AxisValue {
                            axis: axis.name.clone(),
                        },
                        &value.id,
                    ));
                }
            }
            value_indices.push(values);
        }

        Ok(Self {
            axes: axes.to_vec(),
            axis_indices,
            value_indices,
        })
    }

    pub fn axis(&self, name: &str) -> ExpansionResult<&AxisDefinition> {
        self.axis_indices
            .get(name)
            .map(|&i| &self.axes[i])
            .ok_or_else(|| ExpansionError::unknown_axis(name))
    }

    pub fn resolve(&self, axis: &str, value_id: &str) -> ExpansionResult<&AxisValue> {
        let &index = self
            .axis_indices
            .get(axis)
            .ok_or_else(|| ExpansionError::unknown_axis(axis))?;

        self.value_indices[index]
            .get(value_id)
            .map(|&j| &self.axes[index].values[j])
            .ok_or_else(|| ExpansionError::unknown_value(axis, value_id))
    }

    /// Resolve a selector key against one axis.
    ///
    /// A plain key yields `ByValue` when a value has that id and `ByTag` when
    /// any value carries it as a tag (both when both hold). Keys that match
    /// nothing are rejected.
    pub fn compile_key(&self, axis: &str, key: &str) -> ExpansionResult<Vec<AxisSelector>> {
        let definition = self.axis(axis)?;
        let has_tag = |tag: &str| definition.values.iter().any(|v| v.tags.contains(tag));

        let selectors = match AxisSelector::parse(key) {
            AxisSelector::Wildcard => vec![AxisSelector::Wildcard],
            AxisSelector::ByTag(tag) if has_tag(&tag) => vec![AxisSelector::ByTag(tag)],
            AxisSelector::ByTag(_) => Vec::new(),
            AxisSelector::ByValue(id) => {
                let mut selectors = Vec::with_capacity(2);
                if self.resolve(axis, &id).is_ok() {
                    selectors.push(AxisSelector::ByValue(id.clone()));
                }
                if has_tag(&id) {
                    selectors.push(AxisSelector::ByTag(id));
                }
                selectors
            }
        };

        if selectors.is_empty() {
            return Err(ExpansionError::unknown_value(axis, key));
        }
        Ok(selectors)
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AxisDefinition> {
        self.axes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os_axis() -> AxisDefinition {
        AxisDefinition {
            name: "os".to_string(),
            values: vec![
                AxisValue::new("linux").with_tags(["posix"]),
                AxisValue::new("windows"),
            ],
        }
    }

    #[test]
    fn test_resolve() {
        let registry = AxisRegistry::from_definitions(&[os_axis()]).unwrap();
        assert_eq!(registry.resolve("os", "linux").unwrap().id, "linux");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = AxisRegistry::from_definitions(&[os_axis()]).unwrap();
        assert_eq!(
            registry.resolve("arch", "x86").unwrap_err(),
            ExpansionError::unknown_axis("arch")
        );
        assert_eq!(
            registry.resolve("os", "solaris").unwrap_err(),
            ExpansionError::unknown_value("os", "solaris")
        );
    }

    #[test]
    fn test_duplicate_axis_rejected() {
        let err = AxisRegistry::from_definitions(&[os_axis(), os_axis()]).unwrap_err();
        assert_eq!(err, ExpansionError::duplicate(DefinitionKind::Axis, "os"));
    }

    #[test]
    fn test_duplicate_value_rejected() {
        let mut axis = os_axis();
        axis.values.push(AxisValue::new("linux"));
        let err = AxisRegistry::from_definitions(&[axis]).unwrap_err();
        assert!(matches!(
            err,
            ExpansionError::DuplicateDefinition {
                kind: DefinitionKind::AxisValue { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_compile_key_id_tag_and_both() {
        let mut axis = os_axis();
        // "windows" is both an id and a tag on another value
        axis.values[0].tags.insert("windows".to_string());
        let registry = AxisRegistry::from_definitions(&[axis]).unwrap();

        assert_eq!(
            registry.compile_key("os", "posix").unwrap(),
            vec![AxisSelector::ByTag("posix".into())]
        );
        assert_eq!(
            registry.compile_key("os", "windows").unwrap(),
            vec![
                AxisSelector::ByValue("windows".into()),
                AxisSelector::ByTag("windows".into())
            ]
        );
        assert_eq!(
            registry.compile_key("os", "*").unwrap(),
            vec![AxisSelector::Wildcard]
        );
    }

    #[test]
    fn test_compile_key_unknown_tag() {
        let registry = AxisRegistry::from_definitions(&[os_axis()]).unwrap();
        assert_eq!(
            registry.compile_key("os", ".bsd").unwrap_err(),
            ExpansionError::unknown_value("os", ".bsd")
        );
    }
}
