// Expansion Module
// Matrix expansion, variant materialization, task assignment and dependency resolution

pub mod dependency;
pub mod matrix;
pub mod models;
pub mod project;
pub mod tasks;
pub mod variant;

// Re-export key types
pub use dependency::{DependencyGraph, DependencyGraphBuilder};
pub use matrix::{MatrixCell, MatrixExpander};
pub use models::{
    AssignedTask, AssignedVariant, BuildVariant, CellValue, DependencyEdge, ExpansionReport,
    MatrixFailure, ResolvedTask, TaskDependency, TaskRef,
};
pub use project::ProjectExpander;
pub use tasks::{TaskAssignmentResolver, TaskCatalog, TaskTemplate};
pub use variant::{variant_name, VariantMaterializer};
