use clap::{Parser, Subcommand, ValueEnum};
use rapflow::error::Error;
use rapflow::emitter::emit;
use rapflow::flow::{FlowDefinition, ProgramArtifact};
use rapflow::interpreter::{CancellationToken, Interpreter, QueueInput, ReaderInput, RunOptions, WriterSink};
use rapflow::structurer::Structurer;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Output formats of the `convert` command.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Target {
    /// Rapcode program text
    Rapcode,
    /// The syntax tree as JSON
    Json,
    /// A binary program artifact for `run`
    Bin,
}

/// Flowchart structuring compiler and rapcode interpreter
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Structure a flowchart and write it as a program
    Convert {
        /// Path to the flow definition JSON file
        flow_path: PathBuf,

        #[arg(long, value_enum, default_value = "rapcode")]
        to: Target,

        /// Output file; standard output when omitted (required for `--to bin`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Map a custom node kind onto a built-in one, e.g. `Rectangle=statement`
        #[arg(long = "type-map", value_name = "KIND=BUILTIN")]
        type_map: Vec<String>,

        /// Prefix of guard variables introduced for unstructured regions
        #[arg(long)]
        guard_prefix: Option<String>,
    },
    /// Run a program: rapcode text, a flow definition (.json) or an artifact (.rapbin)
    Run {
        program_path: PathBuf,

        /// Input values, consumed in order; standard input is read when none are given
        #[arg(short, long = "input", value_name = "VALUE")]
        inputs: Vec<String>,

        /// Cancel the run after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Command::Convert {
            flow_path,
            to,
            output,
            type_map,
            guard_prefix,
        } => run_convert(&flow_path, to, output.as_deref(), &type_map, guard_prefix.as_deref()),
        Command::Run {
            program_path,
            inputs,
            timeout_ms,
        } => run_program(&program_path, inputs, timeout_ms),
    };

    if let Err(e) = outcome {
        exit_with_error(&e);
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(io::stderr)
        .init();
}

fn read_file(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}

fn write_output(path: Option<&Path>, text: &str) -> Result<(), Error> {
    match path {
        Some(path) => fs::write(path, text).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        }),
        None => io::stdout().write_all(text.as_bytes()).map_err(|source| Error::Io {
            path: "<stdout>".to_string(),
            source,
        }),
    }
}

fn run_convert(
    flow_path: &Path,
    to: Target,
    output: Option<&Path>,
    type_map: &[String],
    guard_prefix: Option<&str>,
) -> Result<(), Error> {
    let start = Instant::now();
    let flow = FlowDefinition::from_json(&read_file(flow_path)?)?;

    let mut builder = Structurer::builder(flow);
    for mapping in type_map {
        match mapping.split_once('=') {
            Some((user_kind, builtin)) => {
                builder = builder.with_type_mapping(user_kind.trim(), builtin.trim());
            }
            None => eprintln!("Ignoring type mapping '{}': expected KIND=BUILTIN", mapping),
        }
    }
    if let Some(prefix) = guard_prefix {
        builder = builder.with_guard_prefix(prefix);
    }
    let program = builder.build().structure()?;
    info!(elapsed = ?start.elapsed(), "Flowchart structured");

    match to {
        Target::Rapcode => write_output(output, &emit(&program)),
        Target::Json => {
            let json = serde_json::to_string_pretty(&program)
                .map_err(|e| rapflow::error::ArtifactError::Encode(e.to_string()))?;
            write_output(output, &(json + "\n"))
        }
        Target::Bin => {
            let default_path = flow_path.with_extension(rapflow::ARTIFACT_EXTENSION);
            let path = output.unwrap_or(&default_path);
            let name = flow_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            ProgramArtifact::new(name, program).save(&path.display().to_string())?;
            eprintln!("Artifact written to {}", path.display());
            Ok(())
        }
    }
}

fn run_program(path: &Path, inputs: Vec<String>, timeout_ms: Option<u64>) -> Result<(), Error> {
    let program = rapflow::load_program(path)?;
    debug!(path = %path.display(), "Program loaded");

    let cancel = CancellationToken::new();
    if let Some(ms) = timeout_ms {
        let token = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(ms));
            token.cancel();
        });
    }
    let options = RunOptions::default().with_cancellation(cancel);

    let stdout = io::stdout();
    let mut output = WriterSink::new(stdout.lock());
    let interpreter = Interpreter::new();
    let result = if inputs.is_empty() {
        let mut input = ReaderInput::new(io::stdin().lock()).with_prompts(Box::new(io::stderr()));
        interpreter.run_with_options(&program, &mut output, &mut input, &options)?
    } else {
        let mut input = QueueInput::new(inputs);
        interpreter.run_with_options(&program, &mut output, &mut input, &options)?
    };

    debug!(statements = result.statements_executed, "Run complete");
    Ok(())
}

fn exit_with_error(error: &Error) -> ! {
    let kind = error.kind();
    eprintln!("[{}] {}", kind, error);
    std::process::exit(kind.exit_code());
}
