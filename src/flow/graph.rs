use crate::ast::Expression;
use crate::error::StructureError;
use ahash::AHashMap;
use std::fmt;

/// Index of a node in the graph arena.
pub type NodeId = usize;

/// The typed payload of a flowchart node, fixed at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Start,
    End,
    Statement { target: String, value: Expression },
    Decision { condition: Expression },
    /// Runs its `loop-body` edge while `condition` holds, then leaves by `loop-exit`.
    Loop { condition: Expression },
    Input { target: String, prompt: Option<String> },
    Output { value: Expression },
    Call { name: String, args: Vec<Expression> },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Statement { .. } => "statement",
            NodeKind::Decision { .. } => "decision",
            NodeKind::Loop { .. } => "loop",
            NodeKind::Input { .. } => "input",
            NodeKind::Output { .. } => "output",
            NodeKind::Call { .. } => "call",
        }
    }

    /// The outgoing edge roles this kind requires, each exactly once.
    pub fn required_roles(&self) -> &'static [EdgeRole] {
        match self {
            NodeKind::End => &[],
            NodeKind::Decision { .. } => &[EdgeRole::True, EdgeRole::False],
            NodeKind::Loop { .. } => &[EdgeRole::LoopBody, EdgeRole::LoopExit],
            _ => &[EdgeRole::Next],
        }
    }
}

/// The role an edge plays for its source node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeRole {
    Next,
    True,
    False,
    LoopBody,
    LoopExit,
}

impl EdgeRole {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeRole::Next => "next",
            EdgeRole::True => "true",
            EdgeRole::False => "false",
            EdgeRole::LoopBody => "loop-body",
            EdgeRole::LoopExit => "loop-exit",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "next" => Some(EdgeRole::Next),
            "true" => Some(EdgeRole::True),
            "false" => Some(EdgeRole::False),
            "loop-body" => Some(EdgeRole::LoopBody),
            "loop-exit" => Some(EdgeRole::LoopExit),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowNode {
    /// External id from the flowchart file, used in error messages.
    pub key: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub role: EdgeRole,
}

/// Arena of flowchart nodes and role-tagged edges.
///
/// Nodes are addressed by [`NodeId`] and never by reference, so cycles need no
/// special ownership handling.
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    index: AHashMap<String, NodeId>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, key: impl Into<String>, kind: NodeKind) -> Result<NodeId, StructureError> {
        let key = key.into();
        if self.index.contains_key(&key) {
            return Err(StructureError::MalformedGraph {
                node_id: key,
                message: "duplicate node id".to_string(),
            });
        }
        let id = self.nodes.len();
        self.index.insert(key.clone(), id);
        self.nodes.push(FlowNode { key, kind });
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        Ok(id)
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, role: EdgeRole) {
        let edge_index = self.edges.len();
        self.edges.push(FlowEdge { from, to, role });
        self.outgoing[from].push(edge_index);
        self.incoming[to].push(edge_index);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &FlowNode {
        &self.nodes[id]
    }

    pub fn node_id(&self, key: &str) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &FlowNode)> {
        self.nodes.iter().enumerate()
    }

    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }

    pub fn start(&self) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.kind == NodeKind::Start)
    }

    pub fn is_end(&self, id: NodeId) -> bool {
        self.nodes[id].kind == NodeKind::End
    }

    /// The target of `id`'s outgoing edge with the given role.
    pub fn successor(&self, id: NodeId, role: EdgeRole) -> Option<NodeId> {
        self.outgoing[id]
            .iter()
            .map(|&e| self.edges[e])
            .find(|e| e.role == role)
            .map(|e| e.to)
    }

    /// Outgoing edges of `id` in insertion order.
    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = (EdgeRole, NodeId)> + '_ {
        self.outgoing[id].iter().map(|&e| (self.edges[e].role, self.edges[e].to))
    }

    pub fn predecessors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.incoming[id].iter().map(|&e| self.edges[e].from)
    }

    /// Checks the node and edge invariants and returns the start node.
    pub fn validate(&self) -> Result<NodeId, StructureError> {
        let mut starts = self
            .nodes()
            .filter(|(_, n)| n.kind == NodeKind::Start)
            .map(|(id, _)| id);
        let start = starts.next().ok_or_else(|| StructureError::MalformedGraph {
            node_id: "<graph>".to_string(),
            message: "graph has no start node".to_string(),
        })?;
        if let Some(extra) = starts.next() {
            return Err(self.malformed(extra, "graph has more than one start node".to_string()));
        }
        if !self.nodes.iter().any(|n| n.kind == NodeKind::End) {
            return Err(StructureError::MalformedGraph {
                node_id: "<graph>".to_string(),
                message: "graph has no end node".to_string(),
            });
        }

        for (id, node) in self.nodes() {
            let required = node.kind.required_roles();
            for (role, _) in self.successors(id) {
                if !required.contains(&role) {
                    return Err(self.malformed(
                        id,
                        format!("a {} node cannot have a '{}' edge", node.kind.name(), role),
                    ));
                }
            }
            for &role in required {
                let count = self.successors(id).filter(|(r, _)| *r == role).count();
                if count != 1 {
                    return Err(self.malformed(
                        id,
                        format!(
                            "a {} node needs exactly one '{}' edge, found {}",
                            node.kind.name(),
                            role,
                            count
                        ),
                    ));
                }
            }
        }

        Ok(start)
    }

    fn malformed(&self, id: NodeId, message: String) -> StructureError {
        StructureError::MalformedGraph {
            node_id: self.nodes[id].key.clone(),
            message,
        }
    }
}
