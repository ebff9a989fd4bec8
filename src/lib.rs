//! # rfml
//!
//! Parser, validator and canonical writer for RFML test definition files.
//!
//! ```text
//! bytes -> lexer -> parser -> TestDefinition --(all files)--> validation -> report
//!                                   |
//!                                   +--> writer (canonical text)
//! ```

pub mod errors;
pub mod graph;
pub mod lexer;
pub mod limits;
pub mod loader;
pub mod parser;
pub mod protocol;
pub mod report;
pub mod telemetry;
pub mod validation;
pub mod writer;

pub use errors::{ErrorCode, StructuredError};
pub use parser::{parse_bytes, parse_str, parse_with_location, ParseOptions, SyntaxError, SyntaxErrorKind};
pub use protocol::{EmbeddedReference, ExternalTest, InstructionStep, Step, TestDefinition};
pub use validation::{validate_suite, validate_suite_with_unloaded, SuiteError, ValidationReport};
pub use writer::render;
