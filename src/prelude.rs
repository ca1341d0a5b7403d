//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the rapflow crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use rapflow::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let json = std::fs::read_to_string("path/to/flow.json")?;
//! let flow = rapflow::flow::FlowDefinition::from_json(&json)?;
//! let program = Structurer::builder(flow).build().structure()?;
//!
//! let mut output: Vec<String> = Vec::new();
//! let mut input = QueueInput::new(["3"]);
//! Interpreter::new().run(&program, &mut output, &mut input)?;
//! println!("{}", output.join("\n"));
//! # Ok(())
//! # }
//! ```

// Structuring and emission
pub use crate::emitter::emit;
pub use crate::flow::{FlowGraph, IntoFlow, ProgramArtifact};
pub use crate::structurer::{Structurer, StructurerBuilder};

// Syntax tree
pub use crate::ast::{Expression, Statement, Value};

// Execution
pub use crate::interpreter::{
    CancellationToken, InputSource, Interpreter, OutputSink, QueueInput, RunOptions, RunResult,
};

// Error types
pub use crate::error::{Error, ErrorKind, RuntimeError, StructureError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
