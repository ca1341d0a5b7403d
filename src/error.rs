use crate::ast::Value;
use std::fmt;
use thiserror::Error;

/// A syntax error in rapcode text or in a flowchart node payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Errors that can occur while loading a flowchart graph or structuring it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructureError {
    #[error("Malformed graph at node '{node_id}': {message}")]
    MalformedGraph { node_id: String, message: String },

    #[error("No path from start node '{start_id}' reaches an end node")]
    UnreachableEnd { start_id: String },

    #[error("Node '{node_id}' has an unregistered or invalid node kind: '{kind_name}'")]
    InvalidNodeKind { node_id: String, kind_name: String },

    #[error(
        "Node '{missing_node_id}' not found, which is required by a connection from node '{source_node_id}'"
    )]
    NodeNotFound {
        missing_node_id: String,
        source_node_id: String,
    },

    #[error("Failed to parse the payload of node '{node_id}': {source}")]
    Payload {
        node_id: String,
        #[source]
        source: ParseError,
    },
}

/// Errors that abort an interpreter run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Variable '{name}' is read before it was ever assigned")]
    UndefinedVariable { name: String },

    #[error(
        "Type mismatch during operation '{operation}': expected {expected}, but found value '{found}'"
    )]
    TypeMismatch {
        operation: String,
        expected: String,
        found: Value,
    },

    #[error("Division by zero in operation '{operation}'")]
    DivisionByZero { operation: String },

    #[error("Call to unknown function or procedure '{name}'")]
    UnboundCall { name: String },

    #[error("Function '{name}' takes {expected} argument(s), but {found} were given")]
    ArityMismatch {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("Input source is exhausted while reading into '{target}'")]
    EndOfInput { target: String },

    #[error("Run was cancelled by the host")]
    Cancelled,

    #[error("Output sink failed: {0}")]
    Sink(String),
}

/// Errors raised while saving or loading a compiled program artifact.
#[derive(Error, Debug, Clone)]
pub enum ArtifactError {
    #[error("Artifact I/O failed for '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Artifact encoding failed: {0}")]
    Encode(String),

    #[error("Artifact decoding failed: {0}")]
    Decode(String),
}

/// Errors that can occur when converting a custom user format into a `FlowDefinition`.
#[derive(Error, Debug, Clone)]
pub enum FlowConversionError {
    #[error("Invalid custom flowchart data: {0}")]
    ValidationError(String),

    #[error("Failed to read flow definition JSON: {0}")]
    Json(String),
}

/// Distinguishable error categories, surfaced by the CLI as names and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedGraph,
    UnreachableEnd,
    Parse,
    UndefinedVariable,
    TypeMismatch,
    DivisionByZero,
    UnboundCall,
    EndOfInput,
    Cancelled,
    Io,
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Io => 2,
            ErrorKind::Parse => 3,
            ErrorKind::MalformedGraph => 4,
            ErrorKind::UnreachableEnd => 5,
            ErrorKind::UndefinedVariable => 10,
            ErrorKind::TypeMismatch => 11,
            ErrorKind::DivisionByZero => 12,
            ErrorKind::UnboundCall => 13,
            ErrorKind::EndOfInput => 14,
            ErrorKind::Cancelled => 130,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::MalformedGraph => "MalformedGraphError",
            ErrorKind::UnreachableEnd => "UnreachableEndError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::UndefinedVariable => "UndefinedVariableError",
            ErrorKind::TypeMismatch => "TypeMismatchError",
            ErrorKind::DivisionByZero => "DivisionByZeroError",
            ErrorKind::UnboundCall => "UnboundCallError",
            ErrorKind::EndOfInput => "EndOfInputError",
            ErrorKind::Cancelled => "CancelledError",
            ErrorKind::Io => "IoError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Umbrella error for the convenience entry points in the crate root.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Conversion(#[from] FlowConversionError),

    #[error("Could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse(_) => ErrorKind::Parse,
            Error::Structure(e) => e.kind(),
            Error::Runtime(e) => e.kind(),
            Error::Artifact(_) | Error::Io { .. } => ErrorKind::Io,
            Error::Conversion(_) => ErrorKind::MalformedGraph,
        }
    }
}

impl StructureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StructureError::MalformedGraph { .. }
            | StructureError::InvalidNodeKind { .. }
            | StructureError::NodeNotFound { .. } => ErrorKind::MalformedGraph,
            StructureError::UnreachableEnd { .. } => ErrorKind::UnreachableEnd,
            StructureError::Payload { .. } => ErrorKind::Parse,
        }
    }
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::UndefinedVariable { .. } => ErrorKind::UndefinedVariable,
            RuntimeError::TypeMismatch { .. } | RuntimeError::ArityMismatch { .. } => {
                ErrorKind::TypeMismatch
            }
            RuntimeError::DivisionByZero { .. } => ErrorKind::DivisionByZero,
            RuntimeError::UnboundCall { .. } => ErrorKind::UnboundCall,
            RuntimeError::EndOfInput { .. } => ErrorKind::EndOfInput,
            RuntimeError::Cancelled => ErrorKind::Cancelled,
            RuntimeError::Sink(_) => ErrorKind::Io,
        }
    }
}
