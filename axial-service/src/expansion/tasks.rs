// Task Assignment
// Applies ordered selector rules to decide which tasks each variant runs

use crate::axis::AxisRegistry;
use crate::error::{DefinitionKind, ExpansionError, ExpansionResult};
use crate::expansion::matrix::MatrixCell;
use crate::expansion::models::AssignedTask;
use crate::parser::models::{
    BuildVariantDefinition, DependencySelector, MatrixDefinition, TaskDefinition, TaskSpec,
};
use crate::selector::CellSelector;

use std::collections::{BTreeSet, HashMap};

/// Project-level task declarations, keyed by name
#[derive(Debug, Clone, Default)]
pub struct TaskCatalog {
    tasks: HashMap<String, TaskDefinition>,
}

impl TaskCatalog {
    pub fn from_definitions(tasks: &[TaskDefinition]) -> ExpansionResult<Self> {
        let mut catalog = HashMap::with_capacity(tasks.len());
        for task in tasks {
            if catalog.insert(task.name.clone(), task.clone()).is_some() {
                return Err(ExpansionError::duplicate(DefinitionKind::Task, &task.name));
            }
        }
        Ok(Self { tasks: catalog })
    }

    pub fn get(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.get(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Merge a spec with its catalog entry. With a non-empty catalog, every
    /// referenced task must be declared there.
    pub fn template(&self, spec: &TaskSpec, referenced_by: &str) -> ExpansionResult<TaskTemplate> {
        let declared = match self.get(&spec.name) {
            Some(definition) => Some(definition),
            None if self.is_empty() => None,
            None => {
                return Err(ExpansionError::UnknownTask {
                    task: spec.name.clone(),
                    referenced_by: referenced_by.to_string(),
                })
            }
        };

        let distros = spec
            .distros
            .clone()
            .or_else(|| declared.and_then(|d| d.distros.clone()));
        let depends_on = spec
            .depends_on
            .clone()
            .or_else(|| declared.map(|d| d.depends_on.clone()))
            .unwrap_or_default();

        Ok(TaskTemplate {
            name: spec.name.clone(),
            distros,
            depends_on,
        })
    }
}

/// A task spec merged with its catalog defaults, not yet bound to a variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTemplate {
    pub name: String,
    pub distros: Option<Vec<String>>,
    pub depends_on: Vec<DependencySelector>,
}

impl TaskTemplate {
    /// Bind to a variant; tasks without their own distros run on the variant's
    pub fn instantiate(&self, run_on: &[String]) -> AssignedTask {
        AssignedTask {
            name: self.name.clone(),
            distros: self.distros.clone().unwrap_or_else(|| run_on.to_vec()),
            depends_on: self.depends_on.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    selector: CellSelector,
    add: Vec<TaskTemplate>,
    remove: BTreeSet<String>,
}

/// Compiled task rules of one matrix
#[derive(Debug, Clone)]
pub struct TaskAssignmentResolver {
    base: Vec<TaskTemplate>,
    rules: Vec<CompiledRule>,
}

impl TaskAssignmentResolver {
    pub fn compile(
        registry: &AxisRegistry,
        matrix: &MatrixDefinition,
        catalog: &TaskCatalog,
    ) -> ExpansionResult<Self> {
        let referenced_by = format!("matrix '{}'", matrix.name);

        let base = matrix
            .tasks
            .iter()
            .map(|spec| catalog.template(spec, &referenced_by))
            .collect::<ExpansionResult<Vec<_>>>()?;

        let rules = matrix
            .rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    selector: CellSelector::compile(
                        registry,
                        &matrix.name,
                        &matrix.axes,
                        &rule.selector,
                    )?,
                    add: rule
                        .add_tasks
                        .iter()
                        .map(|spec| catalog.template(spec, &referenced_by))
                        .collect::<ExpansionResult<Vec<_>>>()?,
                    remove: rule.remove_tasks.clone(),
                })
            })
            .collect::<ExpansionResult<Vec<_>>>()?;

        Ok(Self { base, rules })
    }

    /// Fold the matching rules, in declaration order, over the matrix's base tasks
    pub fn assign(&self, cell: &MatrixCell<'_>, run_on: &[String]) -> Vec<AssignedTask> {
        let initial: Vec<AssignedTask> =
            self.base.iter().map(|t| t.instantiate(run_on)).collect();

        self.rules
            .iter()
            .filter(|rule| rule.selector.matches(&cell.values))
            .fold(initial, |tasks, rule| apply_rule(tasks, rule, run_on))
    }
}

/// Remove every task named by the rule, then append its additions in order.
/// Re-added names are appended again rather than deduplicated.
fn apply_rule(tasks: Vec<AssignedTask>, rule: &CompiledRule, run_on: &[String]) -> Vec<AssignedTask> {
    tasks
        .into_iter()
        .filter(|task| !rule.remove.contains(&task.name))
        .chain(rule.add.iter().map(|t| t.instantiate(run_on)))
        .collect()
}

/// Tasks of a hand-declared variant, in declaration order
pub fn assign_regular(
    definition: &BuildVariantDefinition,
    catalog: &TaskCatalog,
) -> ExpansionResult<Vec<AssignedTask>> {
    let referenced_by = format!("variant '{}'", definition.name);
    definition
        .tasks
        .iter()
        .map(|spec| {
            catalog
                .template(spec, &referenced_by)
                .map(|t| t.instantiate(&definition.run_on))
        })
        .collect()
}
