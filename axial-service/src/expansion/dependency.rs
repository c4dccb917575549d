// Dependency Graph Builder
// Resolves dependency selectors into concrete (task, variant) edges once every variant exists

use crate::axis::AxisRegistry;
use crate::error::{ExpansionError, ExpansionResult};
use crate::expansion::models::{
    AssignedTask, AssignedVariant, BuildVariant, DependencyEdge, ResolvedTask, TaskDependency,
    TaskRef,
};
use crate::parser::models::{
    AxisValue, DependencySelector, MatrixDefinition, VariantSelector, ALL_TASKS,
};
use crate::selector::CellSelector;

use std::collections::{HashMap, HashSet};

/// Variants with concrete dependencies, plus the deduplicated edge list
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub variants: Vec<BuildVariant>,
    pub edges: Vec<DependencyEdge>,
}

/// Builds the dependency graph over the complete variant set of a project
pub struct DependencyGraphBuilder<'a> {
    registry: &'a AxisRegistry,
    /// Matrix definitions, used to compile matrix-scoped selectors
    matrices: &'a [MatrixDefinition],
}

impl<'a> DependencyGraphBuilder<'a> {
    pub fn new(registry: &'a AxisRegistry, matrices: &'a [MatrixDefinition]) -> Self {
        Self { registry, matrices }
    }

    /// Resolve every selector of every task. A selector that yields no edge
    /// fails the whole build; there is no cycle detection.
    pub fn build(&self, variants: &[AssignedVariant]) -> ExpansionResult<DependencyGraph> {
        let index: HashMap<&str, usize> = variants
            .iter()
            .enumerate()
            .map(|(i, v)| (v.name(), i))
            .collect();

        let mut seen_edges = HashSet::new();
        let mut edges = Vec::new();
        let mut resolved = Vec::with_capacity(variants.len());

        for (position, assigned) in variants.iter().enumerate() {
            let mut tasks = Vec::with_capacity(assigned.tasks.len());

            for task in &assigned.tasks {
                let from = TaskRef::new(&task.name, assigned.name());
                let mut seen_targets = HashSet::new();
                let mut depends_on = Vec::new();

                for selector in &task.depends_on {
                    for to in self.resolve(variants, &index, position, task, selector)? {
                        if seen_targets.insert(to.clone()) {
                            depends_on.push(TaskDependency {
                                name: to.task.clone(),
                                variant: to.variant.clone(),
                            });
                        }

                        let edge = DependencyEdge {
                            from: from.clone(),
                            to,
                        };
                        if seen_edges.insert(edge.clone()) {
                            edges.push(edge);
                        }
                    }
                }

                tasks.push(ResolvedTask {
                    name: task.name.clone(),
                    distros: task.distros.clone(),
                    depends_on,
                });
            }

            let mut variant = assigned.variant.clone();
            variant.tasks = tasks;
            resolved.push(variant);
        }

        tracing::debug!(
            variants = resolved.len(),
            edges = edges.len(),
            "resolved dependencies"
        );

        Ok(DependencyGraph {
            variants: resolved,
            edges,
        })
    }

    /// Concrete targets of one selector, never including the dependent itself
    fn resolve(
        &self,
        variants: &[AssignedVariant],
        index: &HashMap<&str, usize>,
        own: usize,
        task: &AssignedTask,
        selector: &DependencySelector,
    ) -> ExpansionResult<Vec<TaskRef>> {
        let dangling = |reason: String| ExpansionError::DanglingDependency {
            variant: variants[own].name().to_string(),
            task: task.name.clone(),
            selector: selector.to_string(),
            reason,
        };

        let candidates: Vec<usize> = match &selector.variant {
            VariantSelector::Same => vec![own],
            VariantSelector::Named(name) => match index.get(name.as_str()) {
                Some(&i) => vec![i],
                None => return Err(dangling(format!("no variant named '{}'", name))),
            },
            VariantSelector::Tagged(tag) => (0..variants.len())
                .filter(|&i| i != own && variants[i].variant.tags.contains(tag))
                .collect(),
            VariantSelector::All => (0..variants.len()).collect(),
            VariantSelector::Matrix { matrix, cell } => {
                let Some(definition) = self.matrices.iter().find(|m| m.name == *matrix) else {
                    return Err(dangling(format!("no matrix named '{}'", matrix)));
                };
                let cells = CellSelector::compile(self.registry, matrix, &definition.axes, cell)?;
                (0..variants.len())
                    .filter(|&i| self.in_matrix(&variants[i].variant, matrix, &cells))
                    .collect()
            }
        };

        let dependent = TaskRef::new(&task.name, variants[own].name());
        let targets: Vec<TaskRef> = candidates
            .into_iter()
            .flat_map(|i| target_tasks(&variants[i], &selector.name))
            .filter(|target| *target != dependent)
            .collect();

        if targets.is_empty() {
            let reason = match selector.variant {
                VariantSelector::Same | VariantSelector::Named(_) => {
                    "the variant does not run a matching task"
                }
                _ => "no variant runs a matching task",
            };
            return Err(dangling(reason.to_string()));
        }

        Ok(targets)
    }

    fn in_matrix(&self, variant: &BuildVariant, matrix: &str, cells: &CellSelector) -> bool {
        if variant.matrix.as_deref() != Some(matrix) {
            return false;
        }

        let values: Vec<&AxisValue> = variant
            .cell
            .iter()
            .filter_map(|c| self.registry.resolve(&c.axis, &c.value).ok())
            .collect();

        values.len() == variant.cell.len() && cells.matches(&values)
    }
}

/// Tasks of one target variant selected by a task name or `*`
fn target_tasks(variant: &AssignedVariant, name: &str) -> Vec<TaskRef> {
    if name == ALL_TASKS {
        variant
            .tasks
            .iter()
            .map(|t| TaskRef::new(&t.name, variant.name()))
            .collect()
    } else if variant.has_task(name) {
        vec![TaskRef::new(name, variant.name())]
    } else {
        Vec::new()
    }
}
