// Axial Service Library
// Expands axis/matrix project definitions into build variants, task lists and dependency edges

pub mod axis;
pub mod config;
pub mod error;
pub mod expansion;
pub mod parser;
pub mod provider;
pub mod selector;

// Re-export commonly used types
pub use config::ExpansionConfig;
pub use error::{DefinitionKind, ExpansionError, ExpansionResult};

// Re-export parser types
pub use parser::{ParseError, ParseErrorKind, ParseResult, ProjectDefinition, ProjectLoader};

// Re-export expansion types
pub use axis::AxisRegistry;
pub use expansion::{
    BuildVariant, DependencyEdge, ExpansionReport, MatrixExpander, MatrixFailure,
    ProjectExpander, ResolvedTask, TaskDependency, TaskRef,
};
pub use selector::{AxisSelector, CellSelector};

// Re-export provider types
pub use provider::{HostIntent, HostProvider, InstanceStatus, ProviderError, ProviderSettings};
