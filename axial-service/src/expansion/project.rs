// Project Expansion
// Drives the full pipeline: registry, per-matrix expansion, regular variants, dependencies

use crate::axis::AxisRegistry;
use crate::config::ExpansionConfig;
use crate::error::{DefinitionKind, ExpansionError, ExpansionResult};
use crate::expansion::dependency::DependencyGraphBuilder;
use crate::expansion::matrix::MatrixExpander;
use crate::expansion::models::{AssignedVariant, ExpansionReport, MatrixFailure};
use crate::expansion::tasks::{assign_regular, TaskAssignmentResolver, TaskCatalog};
use crate::expansion::variant::{regular_variant, VariantMaterializer};
use crate::parser::models::{MatrixDefinition, ProjectDefinition};

use std::collections::HashSet;
use std::sync::Arc;

/// Expands a project definition into its build variants
#[derive(Debug, Clone, Default)]
pub struct ProjectExpander {
    config: ExpansionConfig,
}

impl ProjectExpander {
    pub fn new(config: ExpansionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    /// Expand on the current thread
    pub fn expand(&self, definition: &ProjectDefinition) -> ExpansionResult<ExpansionReport> {
        let (registry, catalog) = prepare(definition)?;

        let outcomes = definition
            .matrices
            .iter()
            .map(|matrix| expand_matrix(&registry, &catalog, matrix))
            .collect();

        self.assemble(definition, &registry, &catalog, outcomes)
    }

    /// Expand each matrix on the blocking pool, then join in matrix order.
    /// Produces the same report as [`ProjectExpander::expand`].
    pub async fn expand_parallel(
        &self,
        definition: Arc<ProjectDefinition>,
    ) -> ExpansionResult<ExpansionReport> {
        let (registry, catalog) = prepare(&definition)?;
        let registry = Arc::new(registry);
        let catalog = Arc::new(catalog);

        let handles: Vec<_> = (0..definition.matrices.len())
            .map(|i| {
                let registry = Arc::clone(&registry);
                let catalog = Arc::clone(&catalog);
                let definition = Arc::clone(&definition);
                tokio::task::spawn_blocking(move || {
                    expand_matrix(&registry, &catalog, &definition.matrices[i])
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (handle, matrix) in handles.into_iter().zip(&definition.matrices) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(ExpansionError::Internal {
                    matrix: matrix.name.clone(),
                    message: e.to_string(),
                }),
            };
            outcomes.push(outcome);
        }

        self.assemble(&definition, &registry, &catalog, outcomes)
    }

    /// Expand using the strategy selected by the configuration
    pub async fn run(&self, definition: Arc<ProjectDefinition>) -> ExpansionResult<ExpansionReport> {
        if self.config.parallel {
            self.expand_parallel(definition).await
        } else {
            self.expand(&definition)
        }
    }

    /// Collect matrix outcomes, add regular variants and resolve dependencies.
    /// `outcomes` is in matrix declaration order.
    fn assemble(
        &self,
        definition: &ProjectDefinition,
        registry: &AxisRegistry,
        catalog: &TaskCatalog,
        outcomes: Vec<ExpansionResult<Vec<AssignedVariant>>>,
    ) -> ExpansionResult<ExpansionReport> {
        let mut variants = Vec::new();
        let mut failures = Vec::new();

        for (matrix, outcome) in definition.matrices.iter().zip(outcomes) {
            match outcome {
                Ok(generated) => variants.extend(generated),
                Err(error) if self.config.strict || !error.is_matrix_scoped() => {
                    return Err(error)
                }
                Err(error) => {
                    tracing::warn!(matrix = %matrix.name, %error, "skipping matrix");
                    failures.push(MatrixFailure {
                        matrix: matrix.name.clone(),
                        error,
                    });
                }
            }
        }

        for regular in &definition.build_variants {
            variants.push(AssignedVariant {
                variant: regular_variant(regular),
                tasks: assign_regular(regular, catalog)?,
            });
        }

        let mut names = HashSet::with_capacity(variants.len());
        for assigned in &variants {
            if !names.insert(assigned.name()) {
                return Err(ExpansionError::duplicate(
                    DefinitionKind::Variant,
                    assigned.name(),
                ));
            }
        }

        let graph = DependencyGraphBuilder::new(registry, &definition.matrices).build(&variants)?;

        tracing::info!(
            matrices = definition.matrices.len(),
            variants = graph.variants.len(),
            edges = graph.edges.len(),
            failures = failures.len(),
            "expanded project"
        );

        Ok(ExpansionReport {
            variants: graph.variants,
            edges: graph.edges,
            failures,
        })
    }
}

/// Project-wide lookups shared by every matrix; any error here is fatal
fn prepare(definition: &ProjectDefinition) -> ExpansionResult<(AxisRegistry, TaskCatalog)> {
    let registry = AxisRegistry::from_definitions(&definition.axes)?;
    let catalog = TaskCatalog::from_definitions(&definition.tasks)?;

    let mut names = HashSet::with_capacity(definition.matrices.len());
    for matrix in &definition.matrices {
        if !names.insert(matrix.name.as_str()) {
            return Err(ExpansionError::duplicate(DefinitionKind::Matrix, &matrix.name));
        }
    }

    Ok((registry, catalog))
}

/// Cells, variants and task lists for one matrix. Touches nothing outside it.
fn expand_matrix(
    registry: &AxisRegistry,
    catalog: &TaskCatalog,
    matrix: &MatrixDefinition,
) -> ExpansionResult<Vec<AssignedVariant>> {
    let cells = MatrixExpander::new(registry).expand(matrix)?;
    let resolver = TaskAssignmentResolver::compile(registry, matrix, catalog)?;
    let materializer = VariantMaterializer::new(matrix);

    Ok(cells
        .iter()
        .map(|cell| {
            let variant = materializer.materialize(cell);
            let tasks = resolver.assign(cell, &variant.run_on);
            AssignedVariant { variant, tasks }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::models::{DependencySelector, SelectorMap, TaskSpec, VariantSelector};
    use crate::parser::ProjectLoader;

    const PROJECT: &str = r#"
axes:
  - name: os
    values:
      - id: linux
        tags: [posix]
      - id: windows
  - name: arch
    values:
      - id: x86
      - id: arm

matrices:
  - name: good
    axes: [os, arch]
    tasks: [compile]
    exclude:
      - os: windows
        arch: arm
  - name: broken
    axes: [os, gpu]
    tasks: [compile]

buildvariants:
  - name: analysis
    run_on: [ubuntu]
    tasks:
      - name: report
        depends_on:
          - name: compile
            variant:
              matrix: good
"#;

    fn project() -> ProjectDefinition {
        ProjectLoader::parse(PROJECT).unwrap()
    }

    #[test]
    fn test_separator_characters_in_ids_do_not_collide() {
        let definition = ProjectLoader::parse(
            r#"
axes:
  - name: a
    values: [{id: p}, {id: "p_b~q"}]
  - name: b
    values: [{id: "q_b~r"}, {id: r}]
matrices:
  - name: m
    axes: [a, b]
    tasks: [compile]
"#,
        )
        .unwrap();

        let report = ProjectExpander::default().expand(&definition).unwrap();
        let names: HashSet<&str> = report.variants.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(report.variants.len(), 4);
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_failed_matrix_is_isolated() {
        let report = ProjectExpander::default().expand(&project()).unwrap();

        let names: Vec<&str> = report.variants.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "good__os~linux_arch~x86",
                "good__os~linux_arch~arm",
                "good__os~windows_arch~x86",
                "analysis",
            ]
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].matrix, "broken");
        assert_eq!(report.failures[0].error, ExpansionError::unknown_axis("gpu"));
        assert_eq!(report.edges.len(), 3);
    }

    #[test]
    fn test_strict_mode_aborts() {
        let expander = ProjectExpander::new(ExpansionConfig::new().with_strict(true));
        assert_eq!(
            expander.expand(&project()).unwrap_err(),
            ExpansionError::unknown_axis("gpu")
        );
    }

    #[test]
    fn test_duplicate_variant_name_is_fatal() {
        let mut definition = project();
        definition.build_variants[0].name = "good__os~linux_arch~x86".to_string();
        assert_eq!(
            ProjectExpander::default().expand(&definition).unwrap_err(),
            ExpansionError::duplicate(DefinitionKind::Variant, "good__os~linux_arch~x86")
        );
    }

    #[test]
    fn test_duplicate_matrix_name_is_fatal() {
        let mut definition = project();
        definition.matrices[1].name = "good".to_string();
        assert_eq!(
            ProjectExpander::default().expand(&definition).unwrap_err(),
            ExpansionError::duplicate(DefinitionKind::Matrix, "good")
        );
    }

    #[test]
    fn test_dependency_on_failed_matrix_dangles() {
        let mut definition = project();
        definition.build_variants[0].tasks[0] = TaskSpec::new("report").depends_on(
            DependencySelector::new(
                "compile",
                VariantSelector::Matrix {
                    matrix: "broken".to_string(),
                    cell: SelectorMap::new(),
                },
            ),
        );

        assert!(matches!(
            ProjectExpander::default().expand(&definition).unwrap_err(),
            ExpansionError::DanglingDependency { .. }
        ));
    }

    #[test]
    fn test_expansion_is_deterministic() {
        let definition = project();
        let expander = ProjectExpander::default();
        assert_eq!(
            expander.expand(&definition).unwrap(),
            expander.expand(&definition).unwrap()
        );
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let definition = Arc::new(project());
        let expander = ProjectExpander::new(ExpansionConfig::new().with_parallel(true));

        let sequential = expander.expand(&definition).unwrap();
        let parallel = expander.run(Arc::clone(&definition)).await.unwrap();
        assert_eq!(sequential, parallel);
    }
}
