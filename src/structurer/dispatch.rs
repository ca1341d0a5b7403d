//! Guard-variable dispatch for regions with no nested if/while form.
//!
//! The region is cut into straight-line blocks. Each block gets a boolean
//! guard variable, and all blocks sit inside one `LOOP` in reverse post-order.
//! A block runs when its guard is set, clears it and sets the guard of the
//! block control moves to next. The loop ends when no guard is set. Jumps out
//! of an enclosing loop are carried past the dispatch loop in two more flags.

use super::reconstruct::{Fallible, Follow, NodeState, Reconstructor, Target, negate, simple_statement};
use crate::ast::{BinaryOp, Expression, Statement};
use crate::flow::{EdgeRole, NodeId, NodeKind};
use ahash::AHashMap;
use itertools::Itertools;
use tracing::info;

/// How an edge that leaves a block is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    /// Run block `k` next.
    Block(usize),
    /// Leave the region by falling through.
    Natural,
    Break,
    Continue,
}

/// Where an edge out of a region node leads.
enum Leaving {
    Inside(NodeId),
    Natural,
    Break,
    Continue,
}

struct Block {
    statements: Vec<Statement>,
    exit: BlockExit,
}

enum BlockExit {
    Goto(Transfer),
    Branch {
        condition: Expression,
        on_true: Transfer,
        on_false: Transfer,
    },
}

impl Reconstructor<'_> {
    /// Dispatch everything reachable from `entry` up to `follow` or the
    /// current loop's header and exit.
    pub(crate) fn dispatch(&mut self, entry: NodeId, follow: Follow) -> Fallible<Vec<Statement>> {
        let region = self.collect_region(entry, follow)?;

        if self.state[entry] == NodeState::Emitted {
            return Err(self.unstructured(entry, "dispatch entry is already emitted"));
        }
        for &x in region.iter().filter(|&&x| x != entry) {
            if self.state[x] != NodeState::Unvisited {
                return Err(self.unstructured(x, "dispatch region overlaps structured code"));
            }
        }

        let mut in_region = vec![false; self.graph.len()];
        for &x in &region {
            in_region[x] = true;
        }
        for &x in region.iter().filter(|&&x| x != entry) {
            let outside = self
                .graph
                .predecessors(x)
                .any(|p| self.analysis.is_reachable(p) && !in_region[p]);
            if outside {
                return Err(self.unstructured(x, "dispatch region has a second entry"));
            }
        }

        let leaders = self.find_leaders(entry, &region, &in_region);
        let numbering: AHashMap<NodeId, usize> = leaders.iter().enumerate().map(|(k, &l)| (l, k)).collect();

        let mut blocks = Vec::with_capacity(leaders.len());
        let mut uses_break = false;
        let mut uses_continue = false;
        for &leader in &leaders {
            let block = self.build_block(leader, follow, &numbering)?;
            let transfers: Vec<Transfer> = match &block.exit {
                BlockExit::Goto(t) => vec![*t],
                BlockExit::Branch { on_true, on_false, .. } => vec![*on_true, *on_false],
            };
            uses_break |= transfers.contains(&Transfer::Break);
            uses_continue |= transfers.contains(&Transfer::Continue);
            blocks.push(block);
        }

        let id = self.dispatch_count;
        self.dispatch_count += 1;
        let names = GuardNames {
            prefix: format!("{}{}", self.guard_prefix, id),
        };

        let mut out = Vec::new();
        for k in 0..blocks.len() {
            out.push(Statement::assign(names.block(k), Expression::boolean(k == 0)));
        }
        if uses_break {
            out.push(Statement::assign(names.flag("break"), Expression::boolean(false)));
        }
        if uses_continue {
            out.push(Statement::assign(names.flag("continue"), Expression::boolean(false)));
        }

        let mut body = Vec::new();
        for (k, block) in blocks.into_iter().enumerate() {
            let mut items = vec![Statement::assign(names.block(k), Expression::boolean(false))];
            items.extend(block.statements);
            match block.exit {
                BlockExit::Goto(t) => items.extend(names.transfer(t)),
                BlockExit::Branch {
                    condition,
                    on_true,
                    on_false,
                } => items.extend(branch(condition, names.transfer(on_true), names.transfer(on_false))),
            }
            body.push(Statement::if_then(
                Expression::variable(names.block(k)),
                Statement::Sequence(items),
            ));
        }
        let any_guard = (0..leaders.len())
            .map(|k| Expression::variable(names.block(k)))
            .reduce(|acc, g| Expression::binary(BinaryOp::Or, acc, g))
            .unwrap_or_else(|| Expression::boolean(false));
        body.push(Statement::if_then(
            Expression::not(any_guard),
            Statement::Sequence(vec![Statement::Break]),
        ));
        out.push(Statement::while_loop(Expression::boolean(true), Statement::Sequence(body)));

        if uses_break {
            out.push(Statement::if_then(
                Expression::variable(names.flag("break")),
                Statement::Sequence(vec![Statement::Break]),
            ));
        }
        if uses_continue {
            out.push(Statement::if_then(
                Expression::variable(names.flag("continue")),
                Statement::Sequence(vec![Statement::Continue]),
            ));
        }

        for &x in &region {
            self.state[x] = NodeState::Emitted;
        }
        info!(
            entry = %self.graph.node(entry).key,
            nodes = region.len(),
            blocks = leaders.len(),
            guards = %names.prefix,
            "Region dispatched with guard variables"
        );
        Ok(out)
    }

    fn classify(&self, y: NodeId, follow: Follow) -> Fallible<Leaving> {
        let frame = self.loops.last();
        if self.target(y) == Target::Exit {
            return match frame {
                None if follow == Follow::Exit => Ok(Leaving::Natural),
                Some(frame) if frame.exit == Some(Target::Exit) => Ok(Leaving::Break),
                _ => Err(self.unstructured(y, "program ends inside the dispatch region")),
            };
        }
        if follow == Follow::Node(y) {
            return Ok(Leaving::Natural);
        }
        if let Some(frame) = frame {
            if y == frame.header {
                return Ok(if follow == Follow::Continue {
                    Leaving::Natural
                } else {
                    Leaving::Continue
                });
            }
            if frame.exit == Some(Target::Node(y)) {
                return Ok(Leaving::Break);
            }
            if !frame.body[y] {
                return Err(self.unstructured(y, "control leaves the loop at a second exit"));
            }
        }
        Ok(Leaving::Inside(y))
    }

    /// Nodes reachable from `entry` without leaving the region, in discovery order.
    fn collect_region(&self, entry: NodeId, follow: Follow) -> Fallible<Vec<NodeId>> {
        let mut seen = vec![false; self.graph.len()];
        let mut region = vec![entry];
        seen[entry] = true;
        let mut cursor = 0;
        while let Some(&x) = region.get(cursor) {
            cursor += 1;
            for (_, y) in self.graph.successors(x) {
                if let Leaving::Inside(y) = self.classify(y, follow)? {
                    if !seen[y] {
                        seen[y] = true;
                        region.push(y);
                    }
                }
            }
        }
        Ok(region)
    }

    /// Block entry points, sorted by reverse post-order with `entry` first.
    fn find_leaders(&self, entry: NodeId, region: &[NodeId], in_region: &[bool]) -> Vec<NodeId> {
        let mut leader = vec![false; self.graph.len()];
        leader[entry] = true;
        for &x in region {
            if matches!(self.graph.node(x).kind, NodeKind::Decision { .. } | NodeKind::Loop { .. }) {
                for (_, y) in self.graph.successors(x) {
                    if in_region[y] {
                        leader[y] = true;
                    }
                }
            }
            let preds = self
                .graph
                .predecessors(x)
                .filter(|&p| self.analysis.is_reachable(p))
                .unique()
                .count();
            if preds >= 2 {
                leader[x] = true;
            }
        }
        region
            .iter()
            .copied()
            .filter(|&x| leader[x])
            .sorted_by_key(|&x| (x != entry, self.analysis.rpo_index(x)))
            .collect()
    }

    fn build_block(
        &self,
        leader: NodeId,
        follow: Follow,
        numbering: &AHashMap<NodeId, usize>,
    ) -> Fallible<Block> {
        let to_transfer = |y: NodeId| -> Fallible<Transfer> {
            Ok(match self.classify(y, follow)? {
                Leaving::Inside(y) => match numbering.get(&y) {
                    Some(&k) => Transfer::Block(k),
                    None => return Err(self.unstructured(y, "jump into the middle of a block")),
                },
                Leaving::Natural => Transfer::Natural,
                Leaving::Break => Transfer::Break,
                Leaving::Continue => Transfer::Continue,
            })
        };
        let edge = |x: NodeId, role: EdgeRole| -> Fallible<NodeId> {
            self.graph
                .successor(x, role)
                .ok_or_else(|| self.unstructured(x, format!("missing '{}' edge", role)))
        };

        let mut statements = Vec::new();
        let mut x = leader;
        loop {
            let (condition, on_true, on_false) = match &self.graph.node(x).kind {
                NodeKind::Decision { condition } => {
                    (condition.clone(), edge(x, EdgeRole::True)?, edge(x, EdgeRole::False)?)
                }
                NodeKind::Loop { condition } => (
                    condition.clone(),
                    edge(x, EdgeRole::LoopBody)?,
                    edge(x, EdgeRole::LoopExit)?,
                ),
                kind => {
                    statements.extend(simple_statement(kind));
                    let y = edge(x, EdgeRole::Next)?;
                    match self.classify(y, follow)? {
                        Leaving::Inside(y) if !numbering.contains_key(&y) => {
                            x = y;
                            continue;
                        }
                        _ => {
                            return Ok(Block {
                                statements,
                                exit: BlockExit::Goto(to_transfer(y)?),
                            });
                        }
                    }
                }
            };
            return Ok(Block {
                statements,
                exit: BlockExit::Branch {
                    condition,
                    on_true: to_transfer(on_true)?,
                    on_false: to_transfer(on_false)?,
                },
            });
        }
    }
}

/// True when `name` has the shape of a variable the dispatcher may introduce
/// under `prefix`: `<prefix><n>_<k>`, `<prefix><n>_break` or `<prefix><n>_continue`.
pub(crate) fn is_guard_name(prefix: &str, name: &str) -> bool {
    let Some((dispatch, slot)) = name.strip_prefix(prefix).and_then(|rest| rest.split_once('_')) else {
        return false;
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(dispatch) && (all_digits(slot) || slot == "break" || slot == "continue")
}

struct GuardNames {
    prefix: String,
}

impl GuardNames {
    fn block(&self, k: usize) -> String {
        format!("{}_{}", self.prefix, k)
    }

    fn flag(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    fn transfer(&self, transfer: Transfer) -> Option<Statement> {
        let name = match transfer {
            Transfer::Block(k) => self.block(k),
            Transfer::Natural => return None,
            Transfer::Break => self.flag("break"),
            Transfer::Continue => self.flag("continue"),
        };
        Some(Statement::assign(name, Expression::boolean(true)))
    }
}

/// `IF` over two optional transfers, omitting empty branches.
fn branch(condition: Expression, on_true: Option<Statement>, on_false: Option<Statement>) -> Option<Statement> {
    let seq = |s: Statement| Statement::Sequence(vec![s]);
    match (on_true, on_false) {
        (None, None) => None,
        (Some(t), None) => Some(Statement::if_then(condition, seq(t))),
        (None, Some(f)) => Some(Statement::if_then(negate(condition), seq(f))),
        (Some(t), Some(f)) => Some(Statement::if_else(condition, seq(t), seq(f))),
    }
}
