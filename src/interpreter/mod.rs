use crate::ast::{Statement, Value};
use crate::error::RuntimeError;
use ahash::AHashMap;
use rayon::prelude::*;
use tracing::debug;

mod builtins;
mod cancel;
mod engine;
mod environment;
mod io;

pub use builtins::NativeFunction;
pub use cancel::CancellationToken;
pub use io::{CallbackSink, InputSource, OutputSink, QueueInput, ReaderInput, WriterSink};

use builtins::register_builtins;
use engine::{Executor, Flow};

/// The outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    /// Final variable bindings, sorted by name.
    pub variables: Vec<(String, Value)>,
    pub statements_executed: usize,
}

impl RunResult {
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| &self.variables[i].1)
    }
}

/// Per-run settings.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cancel: CancellationToken,
}

impl RunOptions {
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

/// One independent program run for [`Interpreter::run_batch`].
#[derive(Debug, Clone)]
pub struct BatchJob<'p> {
    pub program: &'p Statement,
    pub inputs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Output produced before the run finished or failed.
    pub output: Vec<String>,
    pub result: Result<RunResult, RuntimeError>,
}

/// Executes syntax trees.
///
/// An `Interpreter` only holds its function registry, so it can be shared
/// across threads. Every run gets a fresh environment.
pub struct Interpreter {
    functions: AHashMap<String, Box<dyn NativeFunction>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let mut functions: AHashMap<String, Box<dyn NativeFunction>> = AHashMap::new();
        register_builtins(&mut functions);
        Self { functions }
    }

    /// Registers a host function, replacing any function of the same name.
    pub fn with_function(mut self, function: Box<dyn NativeFunction>) -> Self {
        self.functions
            .insert(function.name().to_ascii_uppercase(), function);
        self
    }

    pub fn run(
        &self,
        program: &Statement,
        output: &mut dyn OutputSink,
        input: &mut dyn InputSource,
    ) -> Result<RunResult, RuntimeError> {
        self.run_with_options(program, output, input, &RunOptions::default())
    }

    pub fn run_with_options(
        &self,
        program: &Statement,
        output: &mut dyn OutputSink,
        input: &mut dyn InputSource,
        options: &RunOptions,
    ) -> Result<RunResult, RuntimeError> {
        debug!("Run started");
        let mut executor = Executor::new(&self.functions, output, input, &options.cancel);
        match executor.execute(program) {
            Ok(Flow::Normal) => {}
            // A jump outside any loop ends the program
            Ok(jump) => debug!(?jump, "Jump outside a loop ended the run"),
            Err(e) => {
                debug!(error = %e, "Run failed");
                return Err(e);
            }
        }
        let (variables, statements_executed) = executor.finish();
        debug!(statements_executed, "Run finished");
        Ok(RunResult {
            variables,
            statements_executed,
        })
    }

    /// Runs independent programs in parallel, each with its own input queue
    /// and output buffer. Outcomes are returned in job order.
    pub fn run_batch(&self, jobs: &[BatchJob<'_>]) -> Vec<BatchOutcome> {
        jobs.par_iter()
            .map(|job| {
                let mut output = Vec::new();
                let mut input = QueueInput::new(job.inputs.iter().cloned());
                let result = self.run(job.program, &mut output, &mut input);
                BatchOutcome { output, result }
            })
            .collect()
    }
}
