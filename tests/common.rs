//! Common test utilities for building flowcharts and running programs.
use rapflow::flow::{FlowDefinition, FlowEdgeDefinition, FlowNodeDefinition};
use rapflow::prelude::*;

#[allow(dead_code)]
pub fn node(id: &str, kind: &str) -> FlowNodeDefinition {
    FlowNodeDefinition::new(id, kind)
}

#[allow(dead_code)]
pub fn node_with(id: &str, kind: &str, text: &str) -> FlowNodeDefinition {
    FlowNodeDefinition::new(id, kind).with_text(text)
}

#[allow(dead_code)]
pub fn edge(source: &str, target: &str, role: &str) -> FlowEdgeDefinition {
    FlowEdgeDefinition::new(source, target, role)
}

/// Structures a flow with the default registry, panicking on failure.
#[allow(dead_code)]
pub fn structure(flow: FlowDefinition) -> Statement {
    Structurer::builder(flow)
        .build()
        .structure()
        .expect("flow should structure")
}

/// Runs a program against a fixed list of inputs and returns everything it printed.
#[allow(dead_code)]
pub fn run_with_inputs(program: &Statement, inputs: &[&str]) -> (Vec<String>, std::result::Result<RunResult, RuntimeError>) {
    let mut output: Vec<String> = Vec::new();
    let mut input = QueueInput::new(inputs.iter().copied());
    let result = Interpreter::new().run(program, &mut output, &mut input);
    (output, result)
}

/// Parses rapcode text, panicking on failure.
#[allow(dead_code)]
pub fn parse(source: &str) -> Statement {
    rapflow::parser::parse_program(source).expect("source should parse")
}

/// Scenario A: `x` is read, then a decision prints its sign.
///
/// Logic: `INPUT x` -> `x > 0` ? `"pos"` : `"neg"`
#[allow(dead_code)]
pub fn create_sign_flow() -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            node("start", "start"),
            node_with("read", "input", "x"),
            node_with("test", "decision", "x > 0"),
            node_with("pos", "output", "\"pos\""),
            node_with("neg", "output", "\"neg\""),
            node("end", "end"),
        ],
        edges: vec![
            edge("start", "read", "next"),
            edge("read", "test", "next"),
            edge("test", "pos", "true"),
            edge("test", "neg", "false"),
            edge("pos", "end", "next"),
            edge("neg", "end", "next"),
        ],
    }
}

/// Scenario B: a loop node printing `i` while `i < 3`.
#[allow(dead_code)]
pub fn create_counting_loop_flow() -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            node("start", "start"),
            node_with("init", "statement", "i := 0"),
            node_with("loop", "loop", "i < 3"),
            node_with("print", "output", "i"),
            node_with("step", "statement", "i := i + 1"),
            node("end", "end"),
        ],
        edges: vec![
            edge("start", "init", "next"),
            edge("init", "loop", "next"),
            edge("loop", "print", "loop-body"),
            edge("loop", "end", "loop-exit"),
            edge("print", "step", "next"),
            edge("step", "loop", "next"),
        ],
    }
}

/// Scenario C, clean variant: both branches assign `x`, then meet at a node reading it.
#[allow(dead_code)]
pub fn create_diamond_flow() -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            node("start", "start"),
            node_with("read", "input", "n"),
            node_with("test", "decision", "n > 0"),
            node_with("one", "statement", "x := 1"),
            node_with("two", "statement", "x := 2"),
            node_with("show", "output", "x"),
            node("end", "end"),
        ],
        edges: vec![
            edge("start", "read", "next"),
            edge("read", "test", "next"),
            edge("test", "one", "true"),
            edge("test", "two", "false"),
            edge("one", "show", "next"),
            edge("two", "show", "next"),
            edge("show", "end", "next"),
        ],
    }
}

/// Scenario C, tangled variant: the node reading `x` is shared by two
/// branches at different nesting depths, so it is not the merge of either
/// decision on its own.
///
/// ```text
/// n > 0 ? (x := 1 -> show) : (n < -5 ? (x := 2 -> show) : x := 3)
/// show -> tail ; x := 3 -> tail ; tail prints x * 10
/// ```
#[allow(dead_code)]
pub fn create_tangled_merge_flow() -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            node("start", "start"),
            node_with("read", "input", "n"),
            node_with("outer", "decision", "n > 0"),
            node_with("one", "statement", "x := 1"),
            node_with("inner", "decision", "n < -5"),
            node_with("two", "statement", "x := 2"),
            node_with("three", "statement", "x := 3"),
            node_with("show", "output", "x"),
            node_with("tail", "output", "x * 10"),
            node("end", "end"),
        ],
        edges: vec![
            edge("start", "read", "next"),
            edge("read", "outer", "next"),
            edge("outer", "one", "true"),
            edge("outer", "inner", "false"),
            edge("one", "show", "next"),
            edge("inner", "two", "true"),
            edge("inner", "three", "false"),
            edge("two", "show", "next"),
            edge("three", "tail", "next"),
            edge("show", "tail", "next"),
            edge("tail", "end", "next"),
        ],
    }
}

/// The tangled merge flow written by hand.
#[allow(dead_code)]
pub const TANGLED_MERGE_BY_HAND: &str = r#"
INPUT n
IF n > 0 THEN
  x := 1
  OUTPUT x
ELSE
  IF n < -5 THEN
    x := 2
    OUTPUT x
  ELSE
    x := 3
  ENDIF
ENDIF
OUTPUT x * 10
"#;

/// Scenario D: read once, print once.
#[allow(dead_code)]
pub fn create_echo_flow() -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            node("start", "start"),
            node_with("read", "input", "v"),
            node_with("print", "output", "v"),
            node("end", "end"),
        ],
        edges: vec![
            edge("start", "read", "next"),
            edge("read", "print", "next"),
            edge("print", "end", "next"),
        ],
    }
}

/// A Raptor-style loop: print, then leave when the exit condition holds.
#[allow(dead_code)]
pub fn create_mid_test_loop_flow() -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            node("start", "start"),
            node_with("init", "statement", "i := 0"),
            node_with("print", "output", "i"),
            node_with("step", "statement", "i := i + 1"),
            node_with("done", "decision", "i >= 3"),
            node("end", "end"),
        ],
        edges: vec![
            edge("start", "init", "next"),
            edge("init", "print", "next"),
            edge("print", "step", "next"),
            edge("step", "done", "next"),
            edge("done", "end", "true"),
            edge("done", "print", "false"),
        ],
    }
}

/// Two cycles entered from different sides of one decision.
#[allow(dead_code)]
pub fn create_irreducible_flow() -> FlowDefinition {
    FlowDefinition {
        nodes: vec![
            node("start", "start"),
            node_with("init", "statement", "i := 0"),
            node_with("split", "decision", "i == 0"),
            node_with("left", "statement", "i := i + 1"),
            node_with("right", "statement", "i := i + 2"),
            node_with("check", "decision", "i > 6"),
            node_with("print", "output", "i"),
            node("end", "end"),
        ],
        edges: vec![
            edge("start", "init", "next"),
            edge("init", "split", "next"),
            edge("split", "left", "true"),
            edge("split", "right", "false"),
            edge("left", "check", "next"),
            edge("check", "print", "true"),
            edge("check", "right", "false"),
            edge("right", "left", "next"),
            edge("print", "end", "next"),
        ],
    }
}
