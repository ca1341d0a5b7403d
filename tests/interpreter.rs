//! Interpreter tests: values, operators, control flow, errors and host hooks.
mod common;
use common::*;
use rapflow::interpreter::{BatchJob, CallbackSink, NativeFunction, WriterSink};
use rapflow::prelude::*;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn run_source(source: &str, inputs: &[&str]) -> (Vec<String>, std::result::Result<RunResult, RuntimeError>) {
    run_with_inputs(&parse(source), inputs)
}

fn output_of(source: &str) -> Vec<String> {
    let (output, result) = run_source(source, &[]);
    if let Err(e) = result {
        panic!("run failed: {}", e);
    }
    output
}

// ===== Values and operators =====

#[test]
fn arithmetic_follows_precedence() {
    assert_eq!(output_of("OUTPUT 1 + 2 * 3"), vec!["7"]);
    assert_eq!(output_of("OUTPUT (1 + 2) * 3"), vec!["9"]);
    assert_eq!(output_of("OUTPUT 10 - 4 - 3"), vec!["3"]);
    assert_eq!(output_of("OUTPUT 7 / 2"), vec!["3.5"]);
}

#[test]
fn modulo_is_floored() {
    assert_eq!(output_of("OUTPUT 7 MOD 3"), vec!["1"]);
    assert_eq!(output_of("OUTPUT -7 MOD 3"), vec!["2"]);
    assert_eq!(output_of("OUTPUT 7 MOD -3"), vec!["-2"]);
}

#[test]
fn plus_concatenates_when_either_side_is_text() {
    assert_eq!(output_of("OUTPUT \"n=\" + 5"), vec!["n=5"]);
    assert_eq!(output_of("OUTPUT 1.5 + \"x\""), vec!["1.5x"]);
    assert_eq!(output_of("OUTPUT \"a\" + \"b\""), vec!["ab"]);
    assert_eq!(output_of("OUTPUT \"ok: \" + (1 < 2)"), vec!["ok: TRUE"]);
}

#[test]
fn booleans_print_in_upper_case() {
    assert_eq!(output_of("OUTPUT 1 < 2\nOUTPUT NOT TRUE"), vec!["TRUE", "FALSE"]);
}

#[test]
fn text_compares_lexicographically() {
    assert_eq!(output_of("OUTPUT \"apple\" < \"banana\""), vec!["TRUE"]);
    assert_eq!(output_of("OUTPUT \"a\" == \"a\""), vec!["TRUE"]);
}

#[test]
fn mixed_kinds_are_type_mismatches() {
    let (_, result) = run_source("OUTPUT 1 - \"a\"", &[]);
    match result.unwrap_err() {
        RuntimeError::TypeMismatch { operation, found, .. } => {
            assert_eq!(operation, "-");
            assert_eq!(found, Value::Text("a".into()));
        }
        other => panic!("unexpected error {:?}", other),
    }

    let (_, result) = run_source("OUTPUT 1 == \"1\"", &[]);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::TypeMismatch);

    let (_, result) = run_source("IF 1 THEN\n  OUTPUT 1\nENDIF", &[]);
    assert!(matches!(result, Err(RuntimeError::TypeMismatch { ref operation, .. }) if operation == "IF"));
}

// ===== Errors =====

#[test]
fn reading_an_unassigned_variable_fails() {
    let (_, result) = run_source("OUTPUT y", &[]);
    assert_eq!(
        result.unwrap_err(),
        RuntimeError::UndefinedVariable { name: "y".to_string() }
    );
}

#[test]
fn output_before_a_failure_is_kept() {
    let (output, result) = run_source("OUTPUT \"a\"\nx := 1 / 0\nOUTPUT \"b\"", &[]);
    assert_eq!(output, vec!["a"]);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::DivisionByZero);
}

#[test]
fn zero_divisor_is_reported_before_operand_kinds() {
    let (_, result) = run_source("OUTPUT \"a\" / 0", &[]);
    assert!(matches!(result, Err(RuntimeError::DivisionByZero { .. })));

    let (_, result) = run_source("OUTPUT 5 MOD 0", &[]);
    assert!(matches!(result, Err(RuntimeError::DivisionByZero { ref operation }) if operation == "MOD"));
}

#[test]
fn unknown_functions_are_unbound_calls() {
    let (_, result) = run_source("OUTPUT FOO(1)", &[]);
    assert_eq!(result.unwrap_err(), RuntimeError::UnboundCall { name: "FOO".to_string() });

    let (_, result) = run_source("beep()", &[]);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::UnboundCall);
}

#[test]
fn logical_operators_short_circuit() {
    assert_eq!(
        output_of("IF FALSE AND missing() THEN\n  OUTPUT 1\nELSE\n  OUTPUT 2\nENDIF"),
        vec!["2"]
    );
    assert_eq!(output_of("OUTPUT TRUE OR missing()"), vec!["TRUE"]);

    let (_, result) = run_source("OUTPUT TRUE AND missing()", &[]);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::UnboundCall);
}

// ===== Input =====

#[test]
fn exhausted_input_names_the_target() {
    let program = structure(create_echo_flow());
    let (output, result) = run_with_inputs(&program, &[]);
    assert!(output.is_empty());
    assert_eq!(result.unwrap_err(), RuntimeError::EndOfInput { target: "v".to_string() });
}

#[test]
fn echo_reads_once_and_a_second_read_fails() {
    let program = structure(create_echo_flow());
    let (output, result) = run_with_inputs(&program, &["7"]);
    assert!(result.is_ok());
    assert_eq!(output, vec!["7"]);

    let (output, result) = run_source("INPUT v\nOUTPUT v\nINPUT w\nOUTPUT w", &["7"]);
    assert_eq!(output, vec!["7"]);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::EndOfInput);
}

#[test]
fn division_by_zero_stops_the_run() {
    let (output, result) = run_source("q := 5 / 0\nOUTPUT \"after\"", &[]);
    assert!(output.is_empty());
    assert_eq!(
        result.unwrap_err(),
        RuntimeError::DivisionByZero { operation: "/".to_string() }
    );
}

#[test]
fn unbound_input_prefers_numbers() {
    assert_eq!(run_source("INPUT a\nINPUT b\nOUTPUT a + b", &["2", "3"]).0, vec!["5"]);
    assert_eq!(run_source("INPUT a\nINPUT b\nOUTPUT a + b", &["2", "x"]).0, vec!["2x"]);
}

#[test]
fn bound_input_keeps_the_variable_kind() {
    assert_eq!(run_source("t := \"s\"\nINPUT t\nOUTPUT t + 1", &["4"]).0, vec!["41"]);
    assert_eq!(run_source("f := FALSE\nINPUT f\nOUTPUT NOT f", &["true"]).0, vec!["FALSE"]);

    let (_, result) = run_source("n := 0\nINPUT n", &["abc"]);
    assert!(matches!(result, Err(RuntimeError::TypeMismatch { ref operation, .. }) if operation == "INPUT"));
}

struct RecordingInput {
    prompts: Vec<Option<String>>,
}

impl InputSource for RecordingInput {
    fn read(&mut self, prompt: Option<&str>) -> Option<String> {
        self.prompts.push(prompt.map(str::to_string));
        Some("Ada".to_string())
    }
}

#[test]
fn prompts_reach_the_input_source() {
    let program = parse("name := INPUT(\"Who?\")\nINPUT other\nOUTPUT \"hi \" + INPUT()");
    let mut output: Vec<String> = Vec::new();
    let mut input = RecordingInput { prompts: Vec::new() };
    Interpreter::new().run(&program, &mut output, &mut input).unwrap();

    assert_eq!(input.prompts, vec![Some("Who?".to_string()), None, None]);
    assert_eq!(output, vec!["hi Ada"]);
}

#[test]
fn assigned_input_call_keeps_the_bound_kind() {
    let program = Statement::Sequence(vec![
        Statement::Assign {
            target: "n".into(),
            value: Expression::text("a"),
        },
        Statement::Assign {
            target: "n".into(),
            value: Expression::Call {
                name: "INPUT".into(),
                args: vec![Expression::text("n?")],
            },
        },
        Statement::Output(rapflow::parser::parse_expression("n + 1").unwrap()),
    ]);
    let (output, result) = run_with_inputs(&program, &["5"]);
    assert!(result.is_ok());
    assert_eq!(output, vec!["51"]);

    // A larger expression still reads a fresh value
    let (output, _) = run_source("n := 1\nn := INPUT() + 1\nOUTPUT n", &["5"]);
    assert_eq!(output, vec!["6"]);
}

// ===== Functions =====

#[test]
fn builtins_are_case_insensitive() {
    assert_eq!(
        output_of("OUTPUT ABS(-3)\nOUTPUT sqrt(16)\nOUTPUT LENGTH_OF(\"hello\")\nOUTPUT Max(1, 9, 4)"),
        vec!["3", "4", "5", "9"]
    );
}

#[test]
fn wrong_argument_count_is_a_type_error() {
    let (_, result) = run_source("OUTPUT ABS(1, 2)", &[]);
    let err = result.unwrap_err();
    assert!(matches!(err, RuntimeError::ArityMismatch { found: 2, .. }));
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

struct Tick {
    calls: Arc<AtomicUsize>,
}

impl NativeFunction for Tick {
    fn name(&self) -> &str {
        "TICK"
    }

    fn call(&self, _args: &[Value]) -> std::result::Result<Value, RuntimeError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Value::Number(n as f64))
    }
}

#[test]
fn host_functions_can_be_registered() {
    let calls = Arc::new(AtomicUsize::new(0));
    let interpreter = Interpreter::new().with_function(Box::new(Tick { calls: calls.clone() }));
    let program = parse("tick()\nOUTPUT TICK()\nIF FALSE AND tick() > 0 THEN\n  OUTPUT 0\nENDIF");

    let mut output: Vec<String> = Vec::new();
    let mut input = QueueInput::new(Vec::<String>::new());
    interpreter.run(&program, &mut output, &mut input).unwrap();

    assert_eq!(output, vec!["2"]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ===== Control flow =====

#[test]
fn stray_break_ends_the_program() {
    let (output, result) = run_source("OUTPUT 1\nBREAK\nOUTPUT 2", &[]);
    assert!(result.is_ok());
    assert_eq!(output, vec!["1"]);
}

#[test]
fn continue_skips_to_the_next_iteration() {
    let source = r#"
i := 0
WHILE i < 5 DO
  i := i + 1
  IF i MOD 2 == 0 THEN
    CONTINUE
  ENDIF
  OUTPUT i
ENDLOOP
"#;
    assert_eq!(output_of(source), vec!["1", "3", "5"]);
}

#[test]
fn break_leaves_only_the_innermost_loop() {
    let source = r#"
i := 0
WHILE i < 2 DO
  LOOP
    OUTPUT i
    BREAK
  ENDLOOP
  i := i + 1
ENDLOOP
"#;
    assert_eq!(output_of(source), vec!["0", "1"]);
}

#[test]
fn result_reports_variables_and_statement_count() {
    let (_, result) = run_source("b := 1\na := b + 1\ni := 0\nWHILE i < 2 DO\n  i := i + 1\nENDLOOP", &[]);
    let result = result.unwrap();
    assert_eq!(
        result.variables,
        vec![
            ("a".to_string(), Value::Number(2.0)),
            ("b".to_string(), Value::Number(1.0)),
            ("i".to_string(), Value::Number(2.0)),
        ]
    );
    assert_eq!(result.variable("a"), Some(&Value::Number(2.0)));
    assert_eq!(result.variable("z"), None);
    // three assignments, the loop, two iterations
    assert_eq!(result.statements_executed, 6);
}

#[test]
fn runs_are_deterministic() {
    let program = structure(create_tangled_merge_flow());
    let first = run_with_inputs(&program, &["-10"]);
    let second = run_with_inputs(&program, &["-10"]);
    assert_eq!(first.0, second.0);
    assert_eq!(first.1, second.1);
}

// ===== Host hooks =====

#[test]
fn cancelled_token_stops_before_the_first_statement() {
    let program = parse("LOOP\n  OUTPUT 1\nENDLOOP");
    let token = CancellationToken::new();
    token.cancel();

    let mut output: Vec<String> = Vec::new();
    let mut input = QueueInput::new(Vec::<String>::new());
    let options = RunOptions::default().with_cancellation(token);
    let result = Interpreter::new().run_with_options(&program, &mut output, &mut input, &options);

    assert_eq!(result.unwrap_err(), RuntimeError::Cancelled);
    assert!(output.is_empty());
}

#[test]
fn endless_loop_can_be_cancelled_from_another_thread() {
    let program = parse("i := 0\nLOOP\n  i := i + 1\n  OUTPUT i\nENDLOOP");
    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            token.cancel();
        })
    };

    let mut lines = 0usize;
    let mut sink = CallbackSink::new(|_line: &str| lines += 1);
    let mut input = QueueInput::new(Vec::<String>::new());
    let options = RunOptions::default().with_cancellation(token);
    let result = Interpreter::new().run_with_options(&program, &mut sink, &mut input, &options);
    canceller.join().unwrap();
    drop(sink);

    assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
    assert!(lines > 0);
}

#[test]
fn output_callback_can_cancel_the_run() {
    let program = parse("LOOP\n  OUTPUT \"tick\"\nENDLOOP");
    let token = CancellationToken::new();
    let options = RunOptions::default().with_cancellation(token.clone());

    let mut lines = 0usize;
    let mut sink = CallbackSink::new(|_line: &str| {
        lines += 1;
        if lines == 3 {
            token.cancel();
        }
    });
    let mut input = QueueInput::new(Vec::<String>::new());
    let result = Interpreter::new().run_with_options(&program, &mut sink, &mut input, &options);
    drop(sink);

    assert_eq!(result.unwrap_err(), RuntimeError::Cancelled);
    assert_eq!(lines, 3);
}

#[test]
fn batch_outcomes_follow_job_order() {
    let program = structure(create_sign_flow());
    let values = ["5", "-2", "0", "7"];
    let jobs: Vec<BatchJob> = values
        .iter()
        .map(|v| BatchJob {
            program: &program,
            inputs: vec![v.to_string()],
        })
        .collect();

    let outcomes = Interpreter::new().run_batch(&jobs);
    let outputs: Vec<Vec<String>> = outcomes.iter().map(|o| o.output.clone()).collect();
    assert_eq!(outputs, vec![vec!["pos"], vec!["neg"], vec!["neg"], vec!["pos"]]);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn failing_output_sink_aborts_the_run() {
    let program = parse("OUTPUT 1\nOUTPUT 2");
    let mut sink = WriterSink::new(BrokenPipe);
    let mut input = QueueInput::new(Vec::<String>::new());
    let result = Interpreter::new().run(&program, &mut sink, &mut input);

    let err = result.unwrap_err();
    assert!(matches!(err, RuntimeError::Sink(ref message) if message.contains("pipe closed")));
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn writer_sink_writes_one_line_per_output() {
    let program = parse("OUTPUT \"a\"\nOUTPUT 2");
    let mut sink = WriterSink::new(Vec::<u8>::new());
    let mut input = QueueInput::new(Vec::<String>::new());
    Interpreter::new().run(&program, &mut sink, &mut input).unwrap();
    assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "a\n2\n");
}
