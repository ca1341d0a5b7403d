//! # rapflow - Flowchart Structuring and Rapcode Interpretation
//!
//! **rapflow** turns flowcharts drawn in a visual programming-education tool into
//! structured programs in the small *rapcode* language, and runs those programs.
//! Flowcharts may contain arbitrary merges, back-edges and even irreducible
//! regions; the structurer always produces an equivalent program of sequences,
//! `IF`s and `WHILE`s, falling back to guard variables where no nested form exists.
//!
//! ## Core Workflow
//!
//! 1.  **Load Your Flowchart**: Parse your flowchart format into your own Rust structs,
//!     or read rapflow's JSON `FlowDefinition` directly.
//! 2.  **Convert to rapflow's Model**: Implement the `IntoFlow` trait for your structs to
//!     translate them into a `FlowDefinition`.
//! 3.  **Structure**: Use `Structurer::builder` to turn the definition into a syntax tree.
//! 4.  **Emit or Run**: Print the tree as rapcode with `emitter::emit`, or execute it with
//!     an `Interpreter`, an `OutputSink` and an `InputSource`.
//!
//! ## Quick Start
//!
//! ```rust
//! use rapflow::prelude::*;
//! use rapflow::flow::{FlowDefinition, FlowEdgeDefinition, FlowNodeDefinition};
//!
//! fn main() -> Result<()> {
//!     // Read a number and report its sign
//!     let flow = FlowDefinition {
//!         nodes: vec![
//!             FlowNodeDefinition::new("start", "start"),
//!             FlowNodeDefinition::new("read", "input").with_text("x"),
//!             FlowNodeDefinition::new("test", "decision").with_text("x > 0"),
//!             FlowNodeDefinition::new("pos", "output").with_text("\"pos\""),
//!             FlowNodeDefinition::new("neg", "output").with_text("\"neg\""),
//!             FlowNodeDefinition::new("end", "end"),
//!         ],
//!         edges: vec![
//!             FlowEdgeDefinition::new("start", "read", "next"),
//!             FlowEdgeDefinition::new("read", "test", "next"),
//!             FlowEdgeDefinition::new("test", "pos", "true"),
//!             FlowEdgeDefinition::new("test", "neg", "false"),
//!             FlowEdgeDefinition::new("pos", "end", "next"),
//!             FlowEdgeDefinition::new("neg", "end", "next"),
//!         ],
//!     };
//!
//!     let program = Structurer::builder(flow).build().structure()?;
//!     println!("{}", emit(&program));
//!
//!     let mut output: Vec<String> = Vec::new();
//!     let mut input = QueueInput::new(["5"]);
//!     Interpreter::new().run(&program, &mut output, &mut input)?;
//!     assert_eq!(output, vec!["pos".to_string()]);
//!     Ok(())
//! }
//! ```
//!
//! Logging goes through `tracing`; the library never installs a subscriber.

use std::fs;
use std::path::Path;

pub mod ast;
pub mod emitter;
pub mod error;
pub mod flow;
pub mod interpreter;
pub mod parser;
pub mod prelude;
pub mod structurer;

use ast::Statement;
use error::Error;
use flow::{FlowDefinition, ProgramArtifact};
use interpreter::{InputSource, Interpreter, OutputSink, RunResult};
use structurer::Structurer;

/// File extension of saved program artifacts.
pub const ARTIFACT_EXTENSION: &str = "rapbin";

fn read_file(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Structures a flow definition given as JSON text.
pub fn structure_json(json: &str) -> Result<Statement, Error> {
    let flow = FlowDefinition::from_json(json)?;
    Ok(Structurer::builder(flow).build().structure()?)
}

/// Reads a flow definition file and returns the program as rapcode text.
pub fn convert_flow_file(path: impl AsRef<Path>) -> Result<String, Error> {
    let program = structure_json(&read_file(path.as_ref())?)?;
    Ok(emitter::emit(&program))
}

/// Loads a program by file extension: `.json` flow definitions are
/// structured, `.rapbin` artifacts are decoded, anything else is parsed as
/// rapcode.
pub fn load_program(path: impl AsRef<Path>) -> Result<Statement, Error> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => structure_json(&read_file(path)?),
        Some(ARTIFACT_EXTENSION) => {
            let artifact = ProgramArtifact::from_file(&path.display().to_string())?;
            Ok(artifact.program)
        }
        _ => Ok(parser::parse_program(&read_file(path)?)?),
    }
}

/// Parses and runs rapcode text.
pub fn run_source(
    source: &str,
    output: &mut dyn OutputSink,
    input: &mut dyn InputSource,
) -> Result<RunResult, Error> {
    let program = parser::parse_program(source)?;
    Ok(Interpreter::new().run(&program, output, input)?)
}

/// Loads a program with [`load_program`] and runs it.
pub fn run_file(
    path: impl AsRef<Path>,
    output: &mut dyn OutputSink,
    input: &mut dyn InputSource,
) -> Result<RunResult, Error> {
    let program = load_program(path)?;
    Ok(Interpreter::new().run(&program, output, input)?)
}
