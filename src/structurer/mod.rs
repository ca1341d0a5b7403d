use crate::ast::Statement;
use crate::error::StructureError;
use crate::flow::{FlowDefinition, FlowGraph, NodeKind};
use ahash::AHashMap;
use std::collections::HashSet;
use tracing::{debug, warn};

mod analysis;
mod dispatch;
mod loader;
pub mod parsing;
mod reconstruct;

use analysis::Analysis;
use loader::GraphLoader;
use parsing::*;
use reconstruct::Reconstructor;

/// Default prefix of the guard variables the dispatcher introduces.
pub const DEFAULT_GUARD_PREFIX: &str = "__flow";

enum Source {
    Definition {
        flow: FlowDefinition,
        registry: AHashMap<String, Box<dyn NodeParser>>,
    },
    Graph(FlowGraph),
}

/// Turns a flowchart into a structured program.
///
/// ```
/// use rapflow::flow::{FlowDefinition, FlowEdgeDefinition, FlowNodeDefinition};
/// use rapflow::structurer::Structurer;
///
/// let flow = FlowDefinition {
///     nodes: vec![
///         FlowNodeDefinition::new("s", "start"),
///         FlowNodeDefinition::new("o", "output").with_text("\"hi\""),
///         FlowNodeDefinition::new("e", "end"),
///     ],
///     edges: vec![
///         FlowEdgeDefinition::new("s", "o", "next"),
///         FlowEdgeDefinition::new("o", "e", "next"),
///     ],
/// };
/// let program = Structurer::builder(flow).build().structure().unwrap();
/// assert_eq!(rapflow::emitter::emit(&program), "OUTPUT \"hi\"\n");
/// ```
pub struct Structurer {
    source: Source,
    guard_prefix: String,
}

pub struct StructurerBuilder {
    flow: FlowDefinition,
    registry: AHashMap<String, Box<dyn NodeParser>>,
    guard_prefix: String,
}

impl StructurerBuilder {
    pub fn new(flow: FlowDefinition) -> Self {
        let mut registry: AHashMap<String, Box<dyn NodeParser>> = AHashMap::new();
        register_default_parsers(&mut registry);
        Self {
            flow,
            registry,
            guard_prefix: DEFAULT_GUARD_PREFIX.to_string(),
        }
    }

    /// Lets a flowchart use its own name (`user_kind`) for one of the built-in node kinds.
    /// An unknown `rapflow_kind` leaves the registry unchanged.
    pub fn with_type_mapping(mut self, user_kind: &str, rapflow_kind: &str) -> Self {
        match create_parser_by_name(rapflow_kind) {
            Some(parser) => {
                self.registry.insert(user_kind.to_string(), parser);
            }
            None => warn!(
                user_kind,
                rapflow_kind, "Type mapping names no built-in node kind and is ignored"
            ),
        }
        self
    }

    pub fn with_custom_parser(mut self, parser: Box<dyn NodeParser>) -> Self {
        self.registry.insert(parser.node_type().to_string(), parser);
        self
    }

    /// Prefix of the dispatcher's guard variables. Flowcharts whose own
    /// variables look like guards under this prefix are rejected.
    pub fn with_guard_prefix(mut self, prefix: &str) -> Self {
        self.guard_prefix = prefix.to_string();
        self
    }

    pub fn build(self) -> Structurer {
        Structurer {
            source: Source::Definition {
                flow: self.flow,
                registry: self.registry,
            },
            guard_prefix: self.guard_prefix,
        }
    }
}

impl Structurer {
    pub fn builder(flow: FlowDefinition) -> StructurerBuilder {
        StructurerBuilder::new(flow)
    }

    /// Structures a graph that was built directly rather than loaded.
    pub fn from_graph(graph: FlowGraph) -> Self {
        Self {
            source: Source::Graph(graph),
            guard_prefix: DEFAULT_GUARD_PREFIX.to_string(),
        }
    }

    pub fn with_guard_prefix(mut self, prefix: &str) -> Self {
        self.guard_prefix = prefix.to_string();
        self
    }

    /// Loads the graph and returns the program's syntax tree.
    pub fn structure(&self) -> Result<Statement, StructureError> {
        match &self.source {
            Source::Definition { flow, registry } => {
                let graph = GraphLoader::new(flow, registry).load()?;
                structure_graph(&graph, &self.guard_prefix)
            }
            Source::Graph(graph) => structure_graph(graph, &self.guard_prefix),
        }
    }
}

fn structure_graph(graph: &FlowGraph, guard_prefix: &str) -> Result<Statement, StructureError> {
    let start = graph.validate()?;
    check_guard_collisions(graph, guard_prefix)?;
    let analysis = Analysis::new(graph, start);

    let end_reachable = graph
        .nodes()
        .any(|(id, _)| graph.is_end(id) && analysis.is_reachable(id));
    if !end_reachable {
        return Err(StructureError::UnreachableEnd {
            start_id: graph.node(start).key.clone(),
        });
    }

    if analysis.is_irreducible() {
        debug!("Graph is irreducible, guard dispatch will be needed");
    }

    let mut reconstructor = Reconstructor::new(graph, &analysis, guard_prefix);
    let program = reconstructor.run(start)?;
    debug!(
        dispatched_regions = reconstructor.dispatch_count,
        reachable = analysis.reachable_nodes().len(),
        "Flowchart structured"
    );
    Ok(program)
}

/// Rejects user variables that could be mistaken for dispatcher guards.
fn check_guard_collisions(graph: &FlowGraph, guard_prefix: &str) -> Result<(), StructureError> {
    for (_, node) in graph.nodes() {
        let mut names = HashSet::new();
        match &node.kind {
            NodeKind::Decision { condition } | NodeKind::Loop { condition } => {
                condition.collect_variables(&mut names)
            }
            kind => {
                if let Some(statement) = reconstruct::simple_statement(kind) {
                    statement.collect_variables(&mut names);
                }
            }
        }
        if let Some(name) = names
            .iter()
            .filter(|name| dispatch::is_guard_name(guard_prefix, name))
            .min()
        {
            return Err(StructureError::MalformedGraph {
                node_id: node.key.clone(),
                message: format!(
                    "variable '{}' collides with the guard variables of prefix '{}'",
                    name, guard_prefix
                ),
            });
        }
    }
    Ok(())
}
