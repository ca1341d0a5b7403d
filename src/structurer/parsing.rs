use crate::ast::Expression;
use crate::error::ParseError;
use crate::flow::{FlowNodeDefinition, NodeKind};
use crate::parser;
use ahash::AHashMap;

/// Defines the contract for turning a node of a given `kind` into a typed [`NodeKind`].
pub trait NodeParser: Send + Sync {
    fn node_type(&self) -> &str;
    fn parse(&self, node: &FlowNodeDefinition) -> Result<NodeKind, ParseError>;
}

/// The node's payload text, or an error if the kind needs one and it is missing.
pub fn require_text<'a>(node: &'a FlowNodeDefinition, node_type: &str) -> Result<&'a str, ParseError> {
    match node.text.as_deref() {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ParseError::new(
            format!("a {} node needs payload text", node_type),
            1,
            1,
        )),
    }
}

fn start(_node: &FlowNodeDefinition) -> Result<NodeKind, ParseError> {
    Ok(NodeKind::Start)
}

fn end(_node: &FlowNodeDefinition) -> Result<NodeKind, ParseError> {
    Ok(NodeKind::End)
}

fn statement(node: &FlowNodeDefinition) -> Result<NodeKind, ParseError> {
    let (target, value) = parser::parse_assignment(require_text(node, "statement")?)?;
    Ok(NodeKind::Statement { target, value })
}

fn decision(node: &FlowNodeDefinition) -> Result<NodeKind, ParseError> {
    let condition = parser::parse_expression(require_text(node, "decision")?)?;
    Ok(NodeKind::Decision { condition })
}

fn while_loop(node: &FlowNodeDefinition) -> Result<NodeKind, ParseError> {
    let condition = parser::parse_expression(require_text(node, "loop")?)?;
    Ok(NodeKind::Loop { condition })
}

/// A loop whose payload is an exit condition; stored negated.
fn until_loop(node: &FlowNodeDefinition) -> Result<NodeKind, ParseError> {
    let exit = parser::parse_expression(require_text(node, "until")?)?;
    Ok(NodeKind::Loop {
        condition: Expression::not(exit),
    })
}

fn input(node: &FlowNodeDefinition) -> Result<NodeKind, ParseError> {
    let target = parser::parse_identifier(require_text(node, "input")?)?;
    Ok(NodeKind::Input {
        target,
        prompt: node.prompt.clone(),
    })
}

fn output(node: &FlowNodeDefinition) -> Result<NodeKind, ParseError> {
    let value = parser::parse_expression(require_text(node, "output")?)?;
    Ok(NodeKind::Output { value })
}

fn call(node: &FlowNodeDefinition) -> Result<NodeKind, ParseError> {
    let (name, args) = parser::parse_call(require_text(node, "call")?)?;
    Ok(NodeKind::Call { name, args })
}

/// Master macro to define all standard node parsers, their registration, and their creation.
macro_rules! define_node_parsers {
    ( $( ($struct_name:ident, $node_type:literal, $parse_fn:path) ),* $(,)? ) => {
        // 1. Define all the parser structs and their implementations
        $(
            struct $struct_name;
            impl NodeParser for $struct_name {
                fn node_type(&self) -> &str { $node_type }
                fn parse(&self, node: &FlowNodeDefinition) -> Result<NodeKind, ParseError> {
                    $parse_fn(node)
                }
            }
        )*

        // 2. Define the function to register all default parsers
        pub(super) fn register_default_parsers(registry: &mut AHashMap<String, Box<dyn NodeParser>>) {
            $( registry.insert($node_type.to_string(), Box::new($struct_name)); )*
        }

        // 3. Define the function to create a parser by its kind name
        pub(super) fn create_parser_by_name(name: &str) -> Option<Box<dyn NodeParser>> {
            match name {
                $( $node_type => Some(Box::new($struct_name)), )*
                _ => None,
            }
        }
    };
}

define_node_parsers! {
    (StartNodeParser, "start", start),
    (EndNodeParser, "end", end),
    (StatementNodeParser, "statement", statement),
    (AssignmentNodeParser, "assignment", statement),
    (DecisionNodeParser, "decision", decision),
    (LoopNodeParser, "loop", while_loop),
    (UntilNodeParser, "until", until_loop),
    (InputNodeParser, "input", input),
    (OutputNodeParser, "output", output),
    (CallNodeParser, "call", call),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::UnaryOp;

    fn registry() -> AHashMap<String, Box<dyn NodeParser>> {
        let mut registry = AHashMap::new();
        register_default_parsers(&mut registry);
        registry
    }

    #[test]
    fn until_nodes_store_a_negated_condition() {
        let node = FlowNodeDefinition::new("u", "until").with_text("i >= 3");
        let kind = registry()["until"].parse(&node).unwrap();
        match kind {
            NodeKind::Loop {
                condition: Expression::Unary { op, .. },
            } => assert_eq!(op, UnaryOp::Not),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn input_nodes_keep_their_prompt() {
        let node = FlowNodeDefinition::new("i", "input")
            .with_text("age")
            .with_prompt("How old are you?");
        let kind = registry()["input"].parse(&node).unwrap();
        assert_eq!(
            kind,
            NodeKind::Input {
                target: "age".into(),
                prompt: Some("How old are you?".into()),
            }
        );
    }

    #[test]
    fn missing_payload_is_a_parse_error() {
        let node = FlowNodeDefinition::new("d", "decision");
        let err = registry()["decision"].parse(&node).unwrap_err();
        assert!(err.message.contains("decision"));
    }

    #[test]
    fn parsers_can_be_created_by_name() {
        assert!(create_parser_by_name("output").is_some());
        assert!(create_parser_by_name("flowchart").is_none());
    }
}
