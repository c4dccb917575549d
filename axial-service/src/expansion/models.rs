// Expansion Output Models
// Generated build variants, resolved tasks and concrete dependency edges

use crate::error::{ExpansionError, ExpansionResult};
use crate::parser::models::DependencySelector;

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One (axis, value id) pair of a matrix cell
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CellValue {
    pub axis: String,
    pub value: String,
}

/// A concrete, named configuration with its own task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildVariant {
    pub name: String,
    pub display_name: String,
    /// Generating matrix; `None` for regular variants
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<String>,
    /// Axis values in matrix axis order; empty for regular variants
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cell: Vec<CellValue>,
    pub expansions: BTreeMap<String, String>,
    pub tags: BTreeSet<String>,
    pub run_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stepback: Option<bool>,
    pub tasks: Vec<ResolvedTask>,
}

impl BuildVariant {
    /// First task with the given name
    pub fn task(&self, name: &str) -> Option<&ResolvedTask> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.task(name).is_some()
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn cell_value(&self, axis: &str) -> Option<&str> {
        self.cell
            .iter()
            .find(|c| c.axis == axis)
            .map(|c| c.value.as_str())
    }

    /// True when every (axis, value) pair is part of this variant's cell
    pub fn matches_cell(&self, pairs: &[(&str, &str)]) -> bool {
        !self.cell.is_empty()
            && pairs
                .iter()
                .all(|(axis, value)| self.cell_value(axis) == Some(*value))
    }
}

/// A task assigned to a variant with every dependency made concrete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTask {
    pub name: String,
    pub distros: Vec<String>,
    pub depends_on: Vec<TaskDependency>,
}

/// Fully resolved dependency target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TaskDependency {
    pub name: String,
    pub variant: String,
}

/// A (task, variant) node of the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskRef {
    pub task: String,
    pub variant: String,
}

impl TaskRef {
    pub fn new(task: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            variant: variant.into(),
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.task, self.variant)
    }
}

/// `from` must wait for `to`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DependencyEdge {
    pub from: TaskRef,
    pub to: TaskRef,
}

/// A task assigned to a variant whose dependencies are still selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedTask {
    pub name: String,
    pub distros: Vec<String>,
    pub depends_on: Vec<DependencySelector>,
}

/// A materialized variant between task assignment and dependency resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedVariant {
    /// Variant metadata; `tasks` stays empty until dependencies resolve
    pub variant: BuildVariant,
    pub tasks: Vec<AssignedTask>,
}

impl AssignedVariant {
    pub fn name(&self) -> &str {
        &self.variant.name
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t.name == name)
    }
}

/// A matrix that could not be expanded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixFailure {
    pub matrix: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: ExpansionError,
}

fn serialize_display<T: fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Everything one expansion run produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionReport {
    /// Matrix variants in matrix order, then regular variants in declaration order
    pub variants: Vec<BuildVariant>,
    pub edges: Vec<DependencyEdge>,
    pub failures: Vec<MatrixFailure>,
}

impl ExpansionReport {
    pub fn variant(&self, name: &str) -> Option<&BuildVariant> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Matrix variant whose cell contains every given (axis, value) pair
    pub fn find_cell(&self, pairs: &[(&str, &str)]) -> Option<&BuildVariant> {
        self.variants.iter().find(|v| v.matches_cell(pairs))
    }

    pub fn matrix_variants<'a>(&'a self, matrix: &'a str) -> impl Iterator<Item = &'a BuildVariant> {
        self.variants
            .iter()
            .filter(move |v| v.matrix.as_deref() == Some(matrix))
    }

    /// Edges leaving the given task
    pub fn edges_from<'a>(&'a self, from: &'a TaskRef) -> impl Iterator<Item = &'a DependencyEdge> {
        self.edges.iter().filter(move |e| e.from == *from)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Reject the report if any matrix failed
    pub fn into_result(self) -> ExpansionResult<Self> {
        match self.failures.first() {
            Some(failure) => Err(failure.error.clone()),
            None => Ok(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(name: &str, cell: &[(&str, &str)]) -> BuildVariant {
        BuildVariant {
            name: name.to_string(),
            display_name: name.to_string(),
            matrix: (!cell.is_empty()).then(|| "m".to_string()),
            cell: cell
                .iter()
                .map(|(axis, value)| CellValue {
                    axis: axis.to_string(),
                    value: value.to_string(),
                })
                .collect(),
            expansions: BTreeMap::new(),
            tags: BTreeSet::new(),
            run_on: Vec::new(),
            batch_time: None,
            stepback: None,
            tasks: vec![ResolvedTask {
                name: "compile".to_string(),
                distros: Vec::new(),
                depends_on: Vec::new(),
            }],
        }
    }

    #[test]
    fn test_find_cell() {
        let report = ExpansionReport {
            variants: vec![
                variant("analysis", &[]),
                variant("m__os~linux", &[("os", "linux")]),
            ],
            ..Default::default()
        };
        assert_eq!(report.find_cell(&[("os", "linux")]).unwrap().name, "m__os~linux");
        assert!(report.find_cell(&[("os", "osx")]).is_none());
        // regular variants never match a cell query
        assert!(report.find_cell(&[]).unwrap().matrix.is_some());
        assert_eq!(report.matrix_variants("m").count(), 1);
    }

    #[test]
    fn test_task_lookup() {
        let v = variant("analysis", &[]);
        assert!(v.has_task("compile"));
        assert_eq!(v.task_names(), vec!["compile"]);
        assert!(v.task("lint").is_none());
    }

    #[test]
    fn test_into_result_surfaces_first_failure() {
        let report = ExpansionReport {
            failures: vec![MatrixFailure {
                matrix: "m".to_string(),
                error: ExpansionError::invalid_matrix("m", "no axes"),
            }],
            ..Default::default()
        };
        assert!(!report.is_complete());
        assert_eq!(
            report.into_result().unwrap_err(),
            ExpansionError::invalid_matrix("m", "no axes")
        );
    }

    #[test]
    fn test_failure_serializes_as_message() {
        let failure = MatrixFailure {
            matrix: "m".to_string(),
            error: ExpansionError::unknown_axis("arch"),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["error"], "unknown axis 'arch'");
    }

    #[test]
    fn test_task_ref_display() {
        assert_eq!(TaskRef::new("compile", "analysis").to_string(), "compile@analysis");
    }
}
