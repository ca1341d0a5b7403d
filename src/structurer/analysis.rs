//! Control-flow analysis over the graph arena.
//!
//! Everything here is iterative data-flow over integer ids: a depth-first
//! numbering, Cooper–Harvey–Kennedy dominators, natural loops from back-edges,
//! and post-dominators over the back-edge-free graph extended with a virtual
//! exit node.

use crate::flow::{FlowGraph, NodeId};
use tracing::debug;

const UNDEFINED: usize = usize::MAX;

pub(crate) struct Analysis {
    start: NodeId,
    reachable: Vec<bool>,
    /// Reachable nodes in reverse post-order.
    rpo: Vec<NodeId>,
    rpo_index: Vec<usize>,
    idom: Vec<usize>,
    /// `back_targets[u]` lists the successors of `u` reached by a back-edge.
    back_targets: Vec<Vec<NodeId>>,
    loop_bodies: Vec<Option<Vec<bool>>>,
    /// Immediate post-dominator; `None` means the virtual exit.
    ipdom: Vec<Option<NodeId>>,
    irreducible: bool,
}

impl Analysis {
    pub(crate) fn new(graph: &FlowGraph, start: NodeId) -> Self {
        let n = graph.len();
        let succ: Vec<Vec<NodeId>> = (0..n)
            .map(|id| graph.successors(id).map(|(_, to)| to).collect())
            .collect();

        let (rpo, rpo_index) = reverse_post_order(&succ, start);
        let reachable: Vec<bool> = rpo_index.iter().map(|&i| i != UNDEFINED).collect();
        let idom = immediate_dominators(&succ, start, &rpo, &rpo_index);

        let mut analysis = Self {
            start,
            reachable,
            rpo,
            rpo_index,
            idom,
            back_targets: vec![Vec::new(); n],
            loop_bodies: vec![None; n],
            ipdom: vec![None; n],
            irreducible: false,
        };

        analysis.find_loops(graph, &succ);
        analysis.compute_post_dominators(graph, &succ);

        debug!(
            nodes = n,
            reachable = analysis.rpo.len(),
            loops = analysis.loop_bodies.iter().filter(|b| b.is_some()).count(),
            irreducible = analysis.irreducible,
            "Control-flow analysis finished"
        );
        analysis
    }

    pub(crate) fn is_reachable(&self, id: NodeId) -> bool {
        self.reachable[id]
    }

    pub(crate) fn rpo_index(&self, id: NodeId) -> usize {
        self.rpo_index[id]
    }

    pub(crate) fn reachable_nodes(&self) -> &[NodeId] {
        &self.rpo
    }

    /// True if every path from start to `b` passes through `a`.
    pub(crate) fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if !self.reachable[a] || !self.reachable[b] {
            return false;
        }
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            if cur == self.start {
                return false;
            }
            cur = self.idom[cur];
        }
    }

    pub(crate) fn is_back_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.back_targets[from].contains(&to)
    }

    pub(crate) fn is_loop_header(&self, id: NodeId) -> bool {
        self.loop_bodies[id].is_some()
    }

    pub(crate) fn loop_body(&self, header: NodeId) -> Option<&[bool]> {
        self.loop_bodies[header].as_deref()
    }

    pub(crate) fn ipdom(&self, id: NodeId) -> Option<NodeId> {
        self.ipdom[id]
    }

    pub(crate) fn is_irreducible(&self) -> bool {
        self.irreducible
    }

    fn find_loops(&mut self, graph: &FlowGraph, succ: &[Vec<NodeId>]) {
        let n = succ.len();
        for &u in &self.rpo {
            for &h in &succ[u] {
                if self.dominates(h, u) {
                    self.back_targets[u].push(h);
                } else if self.rpo_index[h] <= self.rpo_index[u] {
                    // Retreating edge into a node that does not dominate its source
                    self.irreducible = true;
                }
            }
        }

        for u in 0..n {
            for &h in &self.back_targets[u].clone() {
                let body = self.loop_bodies[h].get_or_insert_with(|| {
                    let mut body = vec![false; n];
                    body[h] = true;
                    body
                });
                // Reverse walk from the latch up to the header
                let mut stack = vec![u];
                while let Some(x) = stack.pop() {
                    if body[x] {
                        continue;
                    }
                    body[x] = true;
                    stack.extend(graph.predecessors(x).filter(|&p| self.reachable[p]));
                }
            }
        }
    }

    /// Post-dominators on the reversed forward graph, rooted at a virtual exit
    /// that every End node and every node without forward successors feeds.
    fn compute_post_dominators(&mut self, graph: &FlowGraph, succ: &[Vec<NodeId>]) {
        let n = succ.len();
        let exit = n;
        let mut reversed: Vec<Vec<usize>> = vec![Vec::new(); n + 1];

        for &u in &self.rpo {
            let forward: Vec<NodeId> = succ[u]
                .iter()
                .copied()
                .filter(|&v| !self.is_back_edge(u, v))
                .collect();
            if forward.is_empty() || graph.is_end(u) {
                reversed[exit].push(u);
            }
            for v in forward {
                reversed[v].push(u);
            }
        }

        let (rpo, rpo_index) = reverse_post_order(&reversed, exit);
        let ipdom = immediate_dominators(&reversed, exit, &rpo, &rpo_index);
        for id in 0..n {
            self.ipdom[id] = match ipdom[id] {
                UNDEFINED => None,
                p if p == exit => None,
                p => Some(p),
            };
        }
    }
}

/// Iterative depth-first search; returns the visit order and each node's
/// position in it (`UNDEFINED` when unreachable).
fn reverse_post_order(succ: &[Vec<usize>], entry: usize) -> (Vec<usize>, Vec<usize>) {
    let mut visited = vec![false; succ.len()];
    let mut post_order = Vec::with_capacity(succ.len());
    let mut stack: Vec<(usize, usize)> = vec![(entry, 0)];
    visited[entry] = true;

    while let Some(top) = stack.last_mut() {
        let (node, next_child) = *top;
        if let Some(&child) = succ[node].get(next_child) {
            top.1 += 1;
            if !visited[child] {
                visited[child] = true;
                stack.push((child, 0));
            }
        } else {
            post_order.push(node);
            stack.pop();
        }
    }

    post_order.reverse();
    let mut index = vec![UNDEFINED; succ.len()];
    for (i, &node) in post_order.iter().enumerate() {
        index[node] = i;
    }
    (post_order, index)
}

/// Cooper, Harvey & Kennedy, "A Simple, Fast Dominance Algorithm".
fn immediate_dominators(
    succ: &[Vec<usize>],
    entry: usize,
    rpo: &[usize],
    rpo_index: &[usize],
) -> Vec<usize> {
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); succ.len()];
    for &u in rpo {
        for &v in &succ[u] {
            preds[v].push(u);
        }
    }

    let mut idom = vec![UNDEFINED; succ.len()];
    idom[entry] = entry;

    let mut changed = true;
    while changed {
        changed = false;
        for &b in rpo.iter().skip(1) {
            let mut processed = preds[b].iter().copied().filter(|&p| idom[p] != UNDEFINED);
            let Some(first) = processed.next() else {
                continue;
            };
            let new_idom = processed.fold(first, |a, p| intersect(&idom, rpo_index, a, p));
            if idom[b] != new_idom {
                idom[b] = new_idom;
                changed = true;
            }
        }
    }
    idom
}

fn intersect(idom: &[usize], rpo_index: &[usize], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while rpo_index[a] > rpo_index[b] {
            a = idom[a];
        }
        while rpo_index[b] > rpo_index[a] {
            b = idom[b];
        }
    }
    a
}
