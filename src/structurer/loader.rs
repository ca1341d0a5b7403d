use crate::error::StructureError;
use crate::flow::{EdgeRole, FlowDefinition, FlowGraph};
use crate::structurer::parsing::NodeParser;
use ahash::AHashMap;
use tracing::debug;

/// Responsible for turning a string-based `FlowDefinition` into a typed graph arena.
pub(super) struct GraphLoader<'a> {
    flow: &'a FlowDefinition,
    registry: &'a AHashMap<String, Box<dyn NodeParser>>,
}

impl<'a> GraphLoader<'a> {
    pub(super) fn new(flow: &'a FlowDefinition, registry: &'a AHashMap<String, Box<dyn NodeParser>>) -> Self {
        Self { flow, registry }
    }

    pub(super) fn load(&self) -> Result<FlowGraph, StructureError> {
        let mut graph = FlowGraph::new();

        for node in &self.flow.nodes {
            let parser = self
                .registry
                .get(&node.kind)
                .ok_or_else(|| StructureError::InvalidNodeKind {
                    node_id: node.id.clone(),
                    kind_name: node.kind.clone(),
                })?;
            let kind = parser.parse(node).map_err(|source| StructureError::Payload {
                node_id: node.id.clone(),
                source,
            })?;
            graph.add_node(node.id.clone(), kind)?;
        }

        for edge in &self.flow.edges {
            let from = self.find_node(&graph, &edge.source, &edge.target)?;
            let to = self.find_node(&graph, &edge.target, &edge.source)?;
            let role = EdgeRole::parse(&edge.role).ok_or_else(|| StructureError::MalformedGraph {
                node_id: edge.source.clone(),
                message: format!("unknown edge role '{}'", edge.role),
            })?;
            graph.add_edge(from, to, role);
        }

        debug!(
            nodes = graph.len(),
            edges = graph.edges().len(),
            "Flow definition loaded"
        );
        Ok(graph)
    }

    fn find_node(&self, graph: &FlowGraph, node_id: &str, source_id: &str) -> Result<usize, StructureError> {
        graph.node_id(node_id).ok_or_else(|| StructureError::NodeNotFound {
            missing_node_id: node_id.to_string(),
            source_node_id: source_id.to_string(),
        })
    }
}
