// Parser module for project definitions
// Provides the definition models and a YAML/JSON loader

pub mod error;
pub mod loader;
pub mod models;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use loader::ProjectLoader;
pub use models::*;
