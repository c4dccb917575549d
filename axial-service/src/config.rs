// Expansion Configuration
// Knobs controlling how a project is expanded

use serde::{Deserialize, Serialize};

/// Configuration for the project expander
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Expand independent matrices on the blocking thread pool
    pub parallel: bool,

    /// Abort on the first matrix failure instead of isolating it
    pub strict: bool,
}

impl ExpansionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
