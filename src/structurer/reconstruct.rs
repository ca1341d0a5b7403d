//! Structured reconstruction of a flowchart graph.
//!
//! A depth-first walk from the start node turns the graph into nested
//! sequences, `If`s and `While`s. Every node moves through
//! `Unvisited → (InProgress | Scheduled) → Emitted` exactly once per attempt.
//!
//! When a decision or loop cannot be written as nested if/while, the attempt
//! is rolled back to that construct and the remainder of the current sequence
//! is handed to the guard-variable dispatcher (see `dispatch`). If even that
//! is impossible the failure moves outward to the enclosing construct; at the
//! top level the whole program is dispatched.

use super::analysis::Analysis;
use crate::ast::{Expression, Statement, UnaryOp};
use crate::error::StructureError;
use crate::flow::{EdgeRole, FlowGraph, NodeId, NodeKind};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeState {
    Unvisited,
    /// A loop header whose body is being structured.
    InProgress,
    /// A merge point the enclosing sequence will resume from.
    Scheduled,
    Emitted,
}

/// Where an edge leads. Every End node is the same program exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    Node(NodeId),
    Exit,
}

/// Where the sequence being built is allowed to stop by falling through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Follow {
    Node(NodeId),
    /// The end of the innermost loop body.
    Continue,
    /// The end of the program.
    Exit,
}

pub(crate) struct LoopFrame {
    pub(crate) header: NodeId,
    pub(crate) exit: Option<Target>,
    pub(crate) body: Vec<bool>,
}

/// A construct that has no nested if/while form.
#[derive(Debug)]
pub(crate) struct Unstructured {
    pub(crate) node: NodeId,
    pub(crate) reason: String,
}

pub(crate) type Fallible<T> = Result<T, Unstructured>;

/// Statements for a construct, and where the enclosing sequence continues.
type Construct = (Vec<Statement>, Option<Target>);

struct Snapshot {
    state: Vec<NodeState>,
    loops: usize,
}

pub(crate) struct Reconstructor<'g> {
    pub(crate) graph: &'g FlowGraph,
    pub(crate) analysis: &'g Analysis,
    pub(crate) state: Vec<NodeState>,
    pub(crate) loops: Vec<LoopFrame>,
    pub(crate) guard_prefix: String,
    pub(crate) dispatch_count: usize,
}

impl<'g> Reconstructor<'g> {
    pub(crate) fn new(graph: &'g FlowGraph, analysis: &'g Analysis, guard_prefix: &str) -> Self {
        Self {
            graph,
            analysis,
            state: vec![NodeState::Unvisited; graph.len()],
            loops: Vec::new(),
            guard_prefix: guard_prefix.to_string(),
            dispatch_count: 0,
        }
    }

    /// Structure the whole graph from `start`.
    pub(crate) fn run(&mut self, start: NodeId) -> Result<Statement, StructureError> {
        match self.sequence(Target::Node(start), Follow::Exit, false) {
            Ok(items) => Ok(Statement::Sequence(items)),
            Err(failure) => {
                debug!(
                    node = %self.graph.node(failure.node).key,
                    reason = %failure.reason,
                    "Structured reconstruction failed, dispatching the whole program"
                );
                self.state.fill(NodeState::Unvisited);
                self.loops.clear();
                self.dispatch_count = 0;
                self.dispatch(start, Follow::Exit)
                    .map(Statement::Sequence)
                    .map_err(|e| StructureError::MalformedGraph {
                        node_id: self.graph.node(e.node).key.clone(),
                        message: e.reason,
                    })
            }
        }
    }

    pub(crate) fn target(&self, id: NodeId) -> Target {
        if self.graph.is_end(id) {
            Target::Exit
        } else {
            Target::Node(id)
        }
    }

    fn successor(&self, id: NodeId, role: EdgeRole) -> Fallible<Target> {
        self.graph
            .successor(id, role)
            .map(|to| self.target(to))
            .ok_or_else(|| self.unstructured(id, format!("missing '{}' edge", role)))
    }

    pub(crate) fn unstructured(&self, node: NodeId, reason: impl Into<String>) -> Unstructured {
        Unstructured {
            node,
            reason: reason.into(),
        }
    }

    /// Build the sequence starting at `entry` until it reaches `follow` or
    /// ends in a jump. With `header_entry`, `entry` is the header of the
    /// innermost loop and is structured as the first statement of its body.
    pub(crate) fn sequence(
        &mut self,
        entry: Target,
        follow: Follow,
        header_entry: bool,
    ) -> Fallible<Vec<Statement>> {
        let mut out = Vec::new();
        let mut cur = entry;
        let mut header_entry = header_entry;

        loop {
            let n = match cur {
                Target::Exit => {
                    self.reach_exit(&mut out, follow, entry)?;
                    return Ok(out);
                }
                Target::Node(n) => n,
            };

            let entering_header = std::mem::take(&mut header_entry);
            if !entering_header {
                if follow == Follow::Node(n) {
                    return Ok(out);
                }

                if let Some(frame) = self.loops.last() {
                    if n == frame.header {
                        if follow != Follow::Continue {
                            out.push(Statement::Continue);
                        }
                        return Ok(out);
                    }
                    if frame.exit == Some(Target::Node(n)) {
                        out.push(Statement::Break);
                        return Ok(out);
                    }
                    if !frame.body[n] {
                        return Err(self.unstructured(n, "control leaves the loop at a second exit"));
                    }
                }

                match self.state[n] {
                    NodeState::Unvisited => {}
                    NodeState::Emitted => return Err(self.unstructured(n, "node is reached twice")),
                    NodeState::Scheduled => {
                        return Err(self.unstructured(n, "merge point is reached from outside its branches"));
                    }
                    NodeState::InProgress => {
                        return Err(self.unstructured(n, "jump into an enclosing loop header"));
                    }
                }

                if self.analysis.is_loop_header(n) {
                    let (stmts, next) = self.guarded(n, follow, Self::structure_loop)?;
                    out.extend(stmts);
                    match next {
                        Some(next) => {
                            cur = next;
                            continue;
                        }
                        None => return Ok(out),
                    }
                }
            }

            trace!(node = %self.graph.node(n).key, "Structuring node");
            let node = self.graph.node(n);
            let simple = match &node.kind {
                NodeKind::Decision { .. } => {
                    let (stmts, next) = self.guarded(n, follow, Self::structure_if)?;
                    out.extend(stmts);
                    match next {
                        Some(next) => {
                            cur = next;
                            continue;
                        }
                        None => return Ok(out),
                    }
                }
                NodeKind::Loop { .. } => {
                    // A loop node whose body never returns to it
                    let (stmts, _) = self.guarded(n, follow, |this, n, _| {
                        Err(this.unstructured(n, "loop body never returns to the loop node"))
                    })?;
                    out.extend(stmts);
                    return Ok(out);
                }
                NodeKind::End => return Err(self.unstructured(n, "end node inside a sequence")),
                kind => simple_statement(kind),
            };

            out.extend(simple);
            if !entering_header {
                self.state[n] = NodeState::Emitted;
            }
            cur = self.successor(n, EdgeRole::Next)?;
        }
    }

    /// Control reached an End node.
    fn reach_exit(&self, out: &mut Vec<Statement>, follow: Follow, entry: Target) -> Fallible<()> {
        if let Some(frame) = self.loops.last() {
            if frame.exit == Some(Target::Exit) {
                out.push(Statement::Break);
                return Ok(());
            }
            return Err(self.unstructured(frame.header, "program ends inside a loop with another exit"));
        }
        if follow == Follow::Exit {
            return Ok(());
        }
        let node = match entry {
            Target::Node(n) => n,
            Target::Exit => 0,
        };
        Err(self.unstructured(node, "program ends in the middle of a branch"))
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            loops: self.loops.len(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.state = snapshot.state;
        self.loops.truncate(snapshot.loops);
    }

    /// Run `build` for the construct at `n`; on failure roll back and dispatch
    /// the rest of the sequence from `n` instead.
    fn guarded<F>(&mut self, n: NodeId, follow: Follow, build: F) -> Fallible<Construct>
    where
        F: FnOnce(&mut Self, NodeId, Follow) -> Fallible<Construct>,
    {
        let snapshot = self.snapshot();
        match build(self, n, follow) {
            Ok(construct) => Ok(construct),
            Err(failure) => {
                self.restore(snapshot);
                debug!(
                    node = %self.graph.node(failure.node).key,
                    reason = %failure.reason,
                    "Construct is not structured, trying guard dispatch"
                );
                match self.dispatch(n, follow) {
                    Ok(stmts) => Ok((stmts, None)),
                    Err(_) => Err(failure),
                }
            }
        }
    }

    fn structure_if(&mut self, d: NodeId, follow: Follow) -> Fallible<Construct> {
        let NodeKind::Decision { condition } = &self.graph.node(d).kind else {
            return Err(self.unstructured(d, "not a decision"));
        };
        let condition = condition.clone();
        let on_true = self.successor(d, EdgeRole::True)?;
        let on_false = self.successor(d, EdgeRole::False)?;
        self.state[d] = NodeState::Emitted;

        let merge = self.find_merge(d, on_true, on_false)?;
        let (branch_follow, next) = match merge {
            Some(m) if follow == Follow::Node(m) => (follow, Some(Target::Node(m))),
            Some(m) => {
                if self.state[m] != NodeState::Unvisited {
                    return Err(self.unstructured(m, "merge point is already in use"));
                }
                self.state[m] = NodeState::Scheduled;
                (Follow::Node(m), Some(Target::Node(m)))
            }
            None => (follow, None),
        };

        let then_items = self.sequence(on_true, branch_follow, false)?;
        let else_items = self.sequence(on_false, branch_follow, false)?;

        if let Some(Target::Node(m)) = next {
            if self.state[m] == NodeState::Scheduled {
                self.state[m] = NodeState::Unvisited;
            }
        }

        Ok((make_if(condition, then_items, else_items), next))
    }

    /// The closest node both branches reach, restricted to the current loop body.
    fn find_merge(&self, d: NodeId, on_true: Target, on_false: Target) -> Fallible<Option<NodeId>> {
        let (Target::Node(t), Target::Node(f)) = (on_true, on_false) else {
            return Ok(None);
        };
        let reach_true = self.forward_reach(t);
        let reach_false = self.forward_reach(f);

        let common: Vec<NodeId> = (0..self.graph.len())
            .filter(|&x| reach_true[x] && reach_false[x])
            .collect();
        if common.is_empty() {
            return Ok(None);
        }

        let minimal: Vec<NodeId> = common
            .iter()
            .copied()
            .filter(|&m| {
                !common
                    .iter()
                    .any(|&c| c != m && self.forward_reach(c)[m])
            })
            .collect();

        match minimal.as_slice() {
            [m] => Ok(Some(*m)),
            [] => Err(self.unstructured(d, "branches meet only inside a cycle")),
            candidates => match self.analysis.ipdom(d) {
                Some(p) if candidates.contains(&p) => Ok(Some(p)),
                _ => Err(self.unstructured(d, "branches have no unique merge point")),
            },
        }
    }

    /// Nodes reachable from `from` over forward edges without leaving the
    /// current region (loop body minus header, exit and End nodes).
    pub(crate) fn forward_reach(&self, from: NodeId) -> Vec<bool> {
        let mut seen = vec![false; self.graph.len()];
        if !self.in_region(from) {
            return seen;
        }
        let mut stack = vec![from];
        seen[from] = true;
        while let Some(x) = stack.pop() {
            for (_, y) in self.graph.successors(x) {
                if seen[y] || self.analysis.is_back_edge(x, y) || !self.in_region(y) {
                    continue;
                }
                seen[y] = true;
                stack.push(y);
            }
        }
        seen
    }

    fn in_region(&self, x: NodeId) -> bool {
        if self.graph.is_end(x) {
            return false;
        }
        match self.loops.last() {
            Some(frame) => {
                frame.body[x] && x != frame.header && frame.exit != Some(Target::Node(x))
            }
            None => true,
        }
    }

    fn structure_loop(&mut self, h: NodeId, _follow: Follow) -> Fallible<Construct> {
        let body = self
            .analysis
            .loop_body(h)
            .map(<[bool]>::to_vec)
            .ok_or_else(|| self.unstructured(h, "not a loop header"))?;

        let mut exits: Vec<Target> = Vec::new();
        for (x, _) in body.iter().enumerate().filter(|(_, inside)| **inside) {
            for (_, y) in self.graph.successors(x) {
                let t = self.target(y);
                if (t == Target::Exit || !body[y]) && !exits.contains(&t) {
                    exits.push(t);
                }
            }
        }

        let kind = self.graph.node(h).kind.clone();
        let (condition, entry, exit, header_entry) = match kind {
            NodeKind::Loop { condition } => {
                let entry = self.successor(h, EdgeRole::LoopBody)?;
                let exit = self.successor(h, EdgeRole::LoopExit)?;
                if !matches!(entry, Target::Node(b) if body[b]) {
                    return Err(self.unstructured(h, "loop body does not return to the loop node"));
                }
                if exits.iter().any(|t| *t != exit) {
                    return Err(self.unstructured(h, "loop has more than one exit"));
                }
                (condition, entry, Some(exit), false)
            }
            NodeKind::Decision { condition } => {
                let on_true = self.successor(h, EdgeRole::True)?;
                let on_false = self.successor(h, EdgeRole::False)?;
                let inside = |t: Target| matches!(t, Target::Node(x) if body[x]);
                match (inside(on_true), inside(on_false)) {
                    (true, false) if exits.iter().all(|t| *t == on_false) => {
                        (condition, on_true, Some(on_false), false)
                    }
                    (false, true) if exits.iter().all(|t| *t == on_true) => {
                        (negate(condition), on_false, Some(on_true), false)
                    }
                    _ => self.endless_loop_shape(h, &exits)?,
                }
            }
            _ => self.endless_loop_shape(h, &exits)?,
        };

        self.loops.push(LoopFrame {
            header: h,
            exit,
            body,
        });
        self.state[h] = NodeState::InProgress;
        let items = if header_entry {
            self.sequence(Target::Node(h), Follow::Continue, true)?
        } else {
            self.sequence(entry, Follow::Continue, false)?
        };
        self.loops.pop();
        self.state[h] = NodeState::Emitted;

        trace!(header = %self.graph.node(h).key, "Loop structured");
        Ok((
            vec![Statement::while_loop(condition, Statement::Sequence(items))],
            exit,
        ))
    }

    /// `LOOP ... ENDLOOP` with the header as first statement; needs at most one exit.
    fn endless_loop_shape(
        &self,
        h: NodeId,
        exits: &[Target],
    ) -> Fallible<(Expression, Target, Option<Target>, bool)> {
        match exits {
            [] => Ok((Expression::boolean(true), Target::Node(h), None, true)),
            [exit] => Ok((Expression::boolean(true), Target::Node(h), Some(*exit), true)),
            _ => Err(self.unstructured(h, "loop has more than one exit")),
        }
    }
}

/// The statement a straight-line node stands for; `None` for start nodes
/// and for nodes that branch.
pub(crate) fn simple_statement(kind: &NodeKind) -> Option<Statement> {
    match kind {
        NodeKind::Statement { target, value } => Some(Statement::assign(target.clone(), value.clone())),
        NodeKind::Input { target, prompt } => Some(Statement::Input {
            target: target.clone(),
            prompt: prompt.clone(),
        }),
        NodeKind::Output { value } => Some(Statement::Output(value.clone())),
        NodeKind::Call { name, args } => Some(Statement::Call {
            name: name.clone(),
            args: args.clone(),
        }),
        NodeKind::Start | NodeKind::End | NodeKind::Decision { .. } | NodeKind::Loop { .. } => None,
    }
}

pub(crate) fn negate(condition: Expression) -> Expression {
    match condition {
        Expression::Unary {
            op: UnaryOp::Not,
            operand,
        } => *operand,
        other => Expression::not(other),
    }
}

/// Builds an `If`, hoisting the branch that follows a jump out of it.
fn make_if(condition: Expression, then_items: Vec<Statement>, else_items: Vec<Statement>) -> Vec<Statement> {
    let then_branch = Statement::Sequence(then_items);
    let else_branch = Statement::Sequence(else_items);

    if !else_branch.is_empty() && then_branch.ends_in_jump() {
        let mut out = vec![Statement::if_then(condition, then_branch)];
        out.extend(else_branch.into_items());
        return out;
    }
    if !else_branch.is_empty() && (then_branch.is_empty() || else_branch.ends_in_jump()) {
        let mut out = vec![Statement::if_then(negate(condition), else_branch)];
        out.extend(then_branch.into_items());
        return out;
    }
    if else_branch.is_empty() {
        return vec![Statement::if_then(condition, then_branch)];
    }
    vec![Statement::if_else(condition, then_branch, else_branch)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out(n: f64) -> Statement {
        Statement::Output(Expression::number(n))
    }

    #[test]
    fn jump_in_then_branch_hoists_else() {
        let items = make_if(Expression::variable("c"), vec![Statement::Break], vec![out(1.0)]);
        assert_eq!(
            items,
            vec![
                Statement::if_then(Expression::variable("c"), Statement::Sequence(vec![Statement::Break])),
                out(1.0),
            ]
        );
    }

    #[test]
    fn empty_then_branch_negates_condition() {
        let items = make_if(Expression::variable("c"), vec![], vec![out(2.0)]);
        assert_eq!(
            items,
            vec![Statement::if_then(
                Expression::not(Expression::variable("c")),
                Statement::Sequence(vec![out(2.0)])
            )]
        );
    }

    #[test]
    fn double_negation_is_removed() {
        let c = Expression::not(Expression::variable("done"));
        assert_eq!(negate(c), Expression::variable("done"));
    }
}
