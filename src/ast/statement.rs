use super::Expression;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Statement sub-tree of the shared syntax tree.
///
/// Produced both by the structurer and by the rapcode parser, and consumed by
/// the emitter and the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statement {
    Sequence(Vec<Statement>),
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    Assign {
        target: String,
        value: Expression,
    },
    Input {
        target: String,
        prompt: Option<String>,
    },
    Output(Expression),
    Call {
        name: String,
        args: Vec<Expression>,
    },
    Break,
    Continue,
}

impl Statement {
    pub fn empty() -> Self {
        Statement::Sequence(Vec::new())
    }

    /// `target := value`. A bare `INPUT(...)` call as the value yields
    /// [`Statement::Input`], so a variable that is already bound keeps its kind.
    pub fn assign(target: impl Into<String>, value: Expression) -> Self {
        match value.input_prompt() {
            Some(prompt) => Statement::Input {
                target: target.into(),
                prompt,
            },
            None => Statement::Assign {
                target: target.into(),
                value,
            },
        }
    }

    pub fn if_then(condition: Expression, then_branch: Statement) -> Self {
        Statement::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: None,
        }
    }

    pub fn if_else(condition: Expression, then_branch: Statement, else_branch: Statement) -> Self {
        Statement::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: Some(Box::new(else_branch)),
        }
    }

    pub fn while_loop(condition: Expression, body: Statement) -> Self {
        Statement::While {
            condition,
            body: Box::new(body),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Statement::Sequence(items) if items.iter().all(Statement::is_empty))
    }

    /// True when control never falls off the end of this statement.
    pub fn ends_in_jump(&self) -> bool {
        match self {
            Statement::Break | Statement::Continue => true,
            Statement::Sequence(items) => items.last().is_some_and(Statement::ends_in_jump),
            _ => false,
        }
    }

    /// The statements of a sequence, or the statement itself.
    pub fn into_items(self) -> Vec<Statement> {
        match self {
            Statement::Sequence(items) => items,
            other => vec![other],
        }
    }

    /// Canonical form: every block is one flat sequence, empty `ELSE` branches
    /// are dropped and `x := INPUT(...)` assignments are input statements.
    pub fn normalized(&self) -> Statement {
        let mut items = Vec::new();
        self.flatten_into(&mut items);
        Statement::Sequence(items)
    }

    fn flatten_into(&self, out: &mut Vec<Statement>) {
        match self {
            Statement::Sequence(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let else_branch = else_branch
                    .as_ref()
                    .map(|e| e.normalized())
                    .filter(|e| !e.is_empty())
                    .map(Box::new);
                out.push(Statement::If {
                    condition: condition.clone(),
                    then_branch: Box::new(then_branch.normalized()),
                    else_branch,
                });
            }
            Statement::While { condition, body } => out.push(Statement::While {
                condition: condition.clone(),
                body: Box::new(body.normalized()),
            }),
            Statement::Assign { target, value } => out.push(Statement::assign(target.clone(), value.clone())),
            other => out.push(other.clone()),
        }
    }

    /// Equality up to sequence nesting and empty `ELSE` branches.
    pub fn structurally_eq(&self, other: &Statement) -> bool {
        self.normalized() == other.normalized()
    }

    /// Every variable name this statement reads or writes.
    pub fn collect_variables(&self, names: &mut HashSet<String>) {
        match self {
            Statement::Sequence(items) => {
                for item in items {
                    item.collect_variables(names);
                }
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.collect_variables(names);
                then_branch.collect_variables(names);
                if let Some(e) = else_branch {
                    e.collect_variables(names);
                }
            }
            Statement::While { condition, body } => {
                condition.collect_variables(names);
                body.collect_variables(names);
            }
            Statement::Assign { target, value } => {
                names.insert(target.clone());
                value.collect_variables(names);
            }
            Statement::Input { target, .. } => {
                names.insert(target.clone());
            }
            Statement::Output(value) => value.collect_variables(names),
            Statement::Call { args, .. } => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
            Statement::Break | Statement::Continue => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_flattens_nested_sequences() {
        let nested = Statement::Sequence(vec![
            Statement::assign("a", Expression::number(1.0)),
            Statement::Sequence(vec![
                Statement::Sequence(vec![]),
                Statement::assign("b", Expression::number(2.0)),
            ]),
        ]);
        let flat = Statement::Sequence(vec![
            Statement::assign("a", Expression::number(1.0)),
            Statement::assign("b", Expression::number(2.0)),
        ]);
        assert!(nested.structurally_eq(&flat));
    }

    #[test]
    fn empty_else_is_dropped() {
        let with_else = Statement::if_else(
            Expression::boolean(true),
            Statement::Output(Expression::number(1.0)),
            Statement::empty(),
        );
        let without = Statement::if_then(
            Expression::boolean(true),
            Statement::Sequence(vec![Statement::Output(Expression::number(1.0))]),
        );
        assert!(with_else.structurally_eq(&without));
    }

    #[test]
    fn bare_input_assignment_is_an_input_statement() {
        let call = |args| Expression::Call {
            name: "INPUT".into(),
            args,
        };
        assert_eq!(
            Statement::assign("n", call(vec![Expression::text("n?")])),
            Statement::Input {
                target: "n".into(),
                prompt: Some("n?".into()),
            }
        );
        assert_eq!(
            Statement::assign("n", call(vec![])),
            Statement::Input {
                target: "n".into(),
                prompt: None,
            }
        );
        assert!(matches!(
            Statement::assign("n", call(vec![Expression::variable("p")])),
            Statement::Assign { .. }
        ));

        let raw = Statement::Assign {
            target: "n".into(),
            value: call(vec![]),
        };
        assert!(raw.structurally_eq(&Statement::assign("n", call(vec![]))));
    }

    #[test]
    fn variables_are_collected_from_every_position() {
        let program = Statement::Sequence(vec![
            Statement::Input {
                target: "n".into(),
                prompt: None,
            },
            Statement::while_loop(
                Expression::variable("go"),
                Statement::assign("total", Expression::variable("step")),
            ),
            Statement::Call {
                name: "ABS".into(),
                args: vec![Expression::variable("delta")],
            },
        ]);
        let mut names = HashSet::new();
        program.collect_variables(&mut names);
        let mut names: Vec<_> = names.into_iter().collect();
        names.sort();
        assert_eq!(names, vec!["delta", "go", "n", "step", "total"]);
    }

    #[test]
    fn jump_detection_looks_at_last_item() {
        let seq = Statement::Sequence(vec![
            Statement::Output(Expression::number(1.0)),
            Statement::Break,
        ]);
        assert!(seq.ends_in_jump());
        assert!(!Statement::empty().ends_in_jump());
    }
}
