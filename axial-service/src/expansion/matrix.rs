// Matrix Expansion
// Enumerates the admissible cross product of a matrix's axes

use crate::axis::AxisRegistry;
use crate::error::{ExpansionError, ExpansionResult};
use crate::parser::models::{AxisValue, MatrixDefinition};
use crate::selector::CellSelector;

use std::collections::HashSet;

/// A single admissible combination of axis values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixCell<'a> {
    /// Axis names in matrix order
    pub axes: &'a [String],
    /// Selected value for each axis, same order as `axes`
    pub values: Vec<&'a AxisValue>,
}

impl<'a> MatrixCell<'a> {
    /// (axis, value id) pairs in matrix order
    pub fn pairs(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.axes
            .iter()
            .zip(&self.values)
            .map(|(axis, value)| (axis.as_str(), value.id.as_str()))
    }

    pub fn value(&self, axis: &str) -> Option<&'a AxisValue> {
        self.axes
            .iter()
            .position(|name| name == axis)
            .map(|i| self.values[i])
    }
}

/// Matrix expander over an axis registry.
///
/// Expansion walks the full product of axis cardinalities and filters it
/// through the exclude rules; matrices are expected to stay in the tens to
/// low hundreds of cells.
pub struct MatrixExpander<'a> {
    registry: &'a AxisRegistry,
}

impl<'a> MatrixExpander<'a> {
    pub fn new(registry: &'a AxisRegistry) -> Self {
        Self { registry }
    }

    /// Expand a matrix into its admissible cells, axis 0 varying slowest
    pub fn expand(&self, matrix: &'a MatrixDefinition) -> ExpansionResult<Vec<MatrixCell<'a>>> {
        let columns = self.columns(matrix)?;
        let excludes = self.compile_excludes(matrix)?;

        let mut cells = Vec::new();
        let mut excluded = 0usize;
        let mut indices = vec![0usize; columns.len()];

        loop {
            let values: Vec<&'a AxisValue> = indices
                .iter()
                .zip(&columns)
                .map(|(&i, &column)| &column[i])
                .collect();

            if excludes.iter().any(|rule| rule.matches(&values)) {
                excluded += 1;
            } else {
                cells.push(MatrixCell {
                    axes: &matrix.axes,
                    values,
                });
            }

            if !advance(&mut indices, &columns) {
                break;
            }
        }

        tracing::debug!(
            matrix = %matrix.name,
            cells = cells.len(),
            excluded,
            "expanded matrix"
        );

        Ok(cells)
    }

    /// Size of the cross product before exclusion
    pub fn cardinality(&self, matrix: &'a MatrixDefinition) -> ExpansionResult<usize> {
        Ok(self
            .columns(matrix)?
            .iter()
            .map(|column| column.len())
            .product())
    }

    /// Value lists for each matrix axis, validated
    fn columns(&self, matrix: &'a MatrixDefinition) -> ExpansionResult<Vec<&'a [AxisValue]>> {
        let registry: &'a AxisRegistry = self.registry;

        if matrix.axes.is_empty() {
            return Err(ExpansionError::invalid_matrix(&matrix.name, "matrix has no axes"));
        }

        let mut seen = HashSet::with_capacity(matrix.axes.len());
        let mut columns = Vec::with_capacity(matrix.axes.len());

        for axis in &matrix.axes {
            if !seen.insert(axis.as_str()) {
                return Err(ExpansionError::invalid_matrix(
                    &matrix.name,
                    format!("axis '{}' is listed more than once", axis),
                ));
            }

            let definition = registry.axis(axis)?;
            if definition.values.is_empty() {
                return Err(ExpansionError::invalid_matrix(
                    &matrix.name,
                    format!("axis '{}' has no values", axis),
                ));
            }
            columns.push(definition.values.as_slice());
        }

        Ok(columns)
    }

    fn compile_excludes(&self, matrix: &MatrixDefinition) -> ExpansionResult<Vec<CellSelector>> {
        matrix
            .exclude
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                if rule.is_empty() {
                    return Err(ExpansionError::invalid_matrix(
                        &matrix.name,
                        format!("exclude rule #{} has no keys", i + 1),
                    ));
                }
                CellSelector::compile(self.registry, &matrix.name, &matrix.axes, rule)
            })
            .collect()
    }
}

/// Odometer step with the last axis varying fastest.
/// Returns false once every combination has been visited.
fn advance(indices: &mut [usize], columns: &[&[AxisValue]]) -> bool {
    for position in (0..indices.len()).rev() {
        indices[position] += 1;
        if indices[position] < columns[position].len() {
            return true;
        }
        indices[position] = 0;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::models::{AxisDefinition, SelectorMap, SelectorValue};

    fn axis(name: &str, ids: &[&str]) -> AxisDefinition {
        AxisDefinition {
            name: name.to_string(),
            values: ids.iter().map(|id| AxisValue::new(*id)).collect(),
        }
    }

    fn registry() -> AxisRegistry {
        let mut os = axis("os", &["windows", "linux"]);
        os.values[1].tags.insert("posix".to_string());
        AxisRegistry::from_definitions(&[
            os,
            axis("python", &["pypy", "jython", "python2", "python3"]),
            axis("c-extensions", &["with-c", "without-c"]),
            axis("empty", &[]),
        ])
        .unwrap()
    }

    fn matrix(axes: &[&str]) -> MatrixDefinition {
        MatrixDefinition {
            name: "python".to_string(),
            axes: axes.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    fn rule(pairs: &[(&str, &str)]) -> SelectorMap {
        pairs
            .iter()
            .map(|(axis, key)| (axis.to_string(), SelectorValue::from(*key)))
            .collect()
    }

    fn ids(cell: &MatrixCell<'_>) -> Vec<String> {
        cell.pairs().map(|(_, id)| id.to_string()).collect()
    }

    #[test]
    fn test_full_product_without_excludes() {
        let registry = registry();
        let definition = matrix(&["os", "python", "c-extensions"]);
        let cells = MatrixExpander::new(&registry).expand(&definition).unwrap();
        assert_eq!(cells.len(), 2 * 4 * 2);
    }

    #[test]
    fn test_last_axis_varies_fastest() {
        let registry = registry();
        let definition = matrix(&["os", "c-extensions"]);
        let cells = MatrixExpander::new(&registry).expand(&definition).unwrap();

        let order: Vec<Vec<String>> = cells.iter().map(ids).collect();
        assert_eq!(
            order,
            vec![
                vec!["windows", "with-c"],
                vec!["windows", "without-c"],
                vec!["linux", "with-c"],
                vec!["linux", "without-c"],
            ]
        );
    }

    #[test]
    fn test_exclude_rules_filter_cells() {
        let registry = registry();
        let mut definition = matrix(&["os", "python", "c-extensions"]);
        definition.exclude = vec![
            rule(&[("os", "windows"), ("python", "pypy"), ("c-extensions", "with-c")]),
            rule(&[("os", "windows"), ("python", "jython"), ("c-extensions", "with-c")]),
            rule(&[("os", "linux"), ("python", "pypy"), ("c-extensions", "with-c")]),
            rule(&[("os", "linux"), ("python", "jython"), ("c-extensions", "with-c")]),
        ];

        let cells = MatrixExpander::new(&registry).expand(&definition).unwrap();
        assert_eq!(cells.len(), 2 * 4 * 2 - 4);
        assert!(!cells
            .iter()
            .any(|c| ids(c) == vec!["windows", "pypy", "with-c"]));
    }

    #[test]
    fn test_partial_rule_acts_as_wildcard() {
        let registry = registry();
        let mut definition = matrix(&["os", "python", "c-extensions"]);
        definition.exclude = vec![rule(&[("python", "pypy")])];

        let cells = MatrixExpander::new(&registry).expand(&definition).unwrap();
        assert_eq!(cells.len(), 2 * 3 * 2);
        assert!(cells.iter().all(|c| c.value("python").unwrap().id != "pypy"));
    }

    #[test]
    fn test_overlapping_rules_counted_once() {
        let registry = registry();
        let mut definition = matrix(&["os", "python"]);
        definition.exclude = vec![
            rule(&[("python", "pypy")]),
            rule(&[("os", "linux"), ("python", "pypy")]),
            rule(&[("os", "posix")]),
        ];

        // linux row (4) plus windows/pypy (1)
        let cells = MatrixExpander::new(&registry).expand(&definition).unwrap();
        assert_eq!(cells.len(), 8 - 5);
    }

    #[test]
    fn test_cardinality() {
        let registry = registry();
        let definition = matrix(&["os", "python"]);
        assert_eq!(
            MatrixExpander::new(&registry).cardinality(&definition).unwrap(),
            8
        );
    }

    #[test]
    fn test_unknown_axis() {
        let registry = registry();
        let definition = matrix(&["os", "arch"]);
        let err = MatrixExpander::new(&registry).expand(&definition).unwrap_err();
        assert_eq!(err, ExpansionError::unknown_axis("arch"));
    }

    #[test]
    fn test_invalid_matrices() {
        let registry = registry();
        let expander = MatrixExpander::new(&registry);

        for definition in [matrix(&[]), matrix(&["os", "empty"]), matrix(&["os", "os"])] {
            let err = expander.expand(&definition).unwrap_err();
            assert!(
                matches!(err, ExpansionError::InvalidMatrix { .. }),
                "unexpected {:?}",
                err
            );
        }

        let mut definition = matrix(&["os"]);
        definition.exclude = vec![SelectorMap::new()];
        assert!(matches!(
            expander.expand(&definition).unwrap_err(),
            ExpansionError::InvalidMatrix { .. }
        ));
    }

    #[test]
    fn test_exclude_with_unknown_value() {
        let registry = registry();
        let mut definition = matrix(&["os"]);
        definition.exclude = vec![rule(&[("os", "solaris")])];
        assert_eq!(
            MatrixExpander::new(&registry).expand(&definition).unwrap_err(),
            ExpansionError::unknown_value("os", "solaris")
        );
    }
}
