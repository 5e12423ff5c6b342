//! Recursive tree-walking evaluator.
//!
//! Evaluation never fails outward: every error raised inside a subtree is
//! logged with the formula id and node path and replaced by
//! [`Value::Unknown`], so one malformed formula cannot halt a mission tick.

use std::sync::Arc;

use thiserror::Error;

use crate::context::GameContext;
use crate::ledger::MissionLedger;
use crate::node::{Atom, Formula, Node, NodeKind, NodePath};
use crate::registry::{OperatorFlags, OperatorHandler, OperatorRegistry, OperatorSpec};
use crate::value::Value;
use crate::variables::VariableStore;

/// Evaluation depth past which a subtree yields `Unknown`. The parser keeps
/// trees well below this.
pub const MAX_EVAL_DEPTH: usize = 512;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
    #[error("'{operator}' expects {expected} arguments, got {found}")]
    ArityMismatch {
        operator: String,
        expected: String,
        found: usize,
    },
    #[error("'{operator}' argument {index} expects {expected}, got {found}")]
    ArgumentMismatch {
        operator: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("variable '{0}' is not declared")]
    UnknownVariable(String),
    #[error("'{operator}' failed: {reason}")]
    Domain { operator: String, reason: String },
    #[error("node is not an operator application")]
    NotAnOperator,
    #[error("evaluation exceeded depth {0}")]
    DepthExceeded(usize),
}

impl EvalError {
    pub fn domain(operator: &str, reason: impl Into<String>) -> Self {
        EvalError::Domain {
            operator: operator.to_string(),
            reason: reason.into(),
        }
    }

    pub fn argument(operator: &str, index: usize, expected: &'static str, found: &Value) -> Self {
        EvalError::ArgumentMismatch {
            operator: operator.to_string(),
            index,
            expected,
            found: found.kind_name(),
        }
    }
}

/// Mutable mission state handed to the evaluator for one evaluation.
pub struct Env<'a> {
    pub game: &'a mut dyn GameContext,
    pub variables: &'a mut VariableStore,
    pub ledger: &'a mut MissionLedger,
}

impl<'a> Env<'a> {
    pub fn new(
        game: &'a mut dyn GameContext,
        variables: &'a mut VariableStore,
        ledger: &'a mut MissionLedger,
    ) -> Self {
        Self {
            game,
            variables,
            ledger,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    registry: Arc<OperatorRegistry>,
}

impl Evaluator {
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        &self.registry
    }

    /// Evaluates a whole formula. `formula_id` names the owning event or goal
    /// in diagnostics.
    pub fn evaluate_formula(&self, formula_id: &str, formula: &Formula, env: &mut Env<'_>) -> Value {
        self.evaluate(formula_id, formula.root(), env)
    }

    pub fn evaluate(&self, formula_id: &str, node: &Node, env: &mut Env<'_>) -> Value {
        let mut frame = Frame {
            evaluator: self,
            env,
            formula_id,
            path: Vec::new(),
        };
        frame.eval_node(node)
    }
}

/// Evaluation cursor handed to operator handlers.
///
/// Lazy handlers call [`Frame::eval_arg`] to evaluate the children they need,
/// in the order they need them.
pub struct Frame<'e, 'a> {
    evaluator: &'e Evaluator,
    env: &'e mut Env<'a>,
    formula_id: &'e str,
    path: Vec<usize>,
}

impl<'e, 'a> Frame<'e, 'a> {
    pub fn game(&mut self) -> &mut (dyn GameContext + 'a) {
        &mut *self.env.game
    }

    pub fn variables(&mut self) -> &mut VariableStore {
        &mut *self.env.variables
    }

    pub fn ledger(&mut self) -> &mut MissionLedger {
        &mut *self.env.ledger
    }

    pub fn now(&self) -> f64 {
        self.env.game.current_time()
    }

    pub fn formula_id(&self) -> &str {
        self.formula_id
    }

    pub fn path(&self) -> NodePath {
        NodePath(self.path.clone())
    }

    /// Evaluates argument `index` (zero-based, not counting the operator head)
    /// of the operator currently being dispatched.
    pub fn eval_arg(&mut self, index: usize, node: &Node) -> Value {
        self.path.push(index + 1);
        let value = self.eval_node(node);
        self.path.pop();
        value
    }

    fn eval_node(&mut self, node: &Node) -> Value {
        match self.try_eval(node) {
            Ok(value) => value,
            Err(err) => {
                self.report(node, &err);
                Value::Unknown
            }
        }
    }

    fn try_eval(&mut self, node: &Node) -> Result<Value, EvalError> {
        if self.path.len() >= MAX_EVAL_DEPTH {
            return Err(EvalError::DepthExceeded(MAX_EVAL_DEPTH));
        }
        match &node.kind {
            NodeKind::Atom(Atom::Number(n)) => Ok(Value::Number(*n)),
            NodeKind::Atom(Atom::Text(text)) => Ok(Value::Text(text.clone())),
            NodeKind::Atom(Atom::Variable(name)) => self
                .env
                .variables
                .get(name)
                .cloned()
                .map(Value::from)
                .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
            NodeKind::Atom(Atom::Operator(_)) => Err(EvalError::NotAnOperator),
            NodeKind::List(_) => self.apply(node),
        }
    }

    fn apply(&mut self, node: &Node) -> Result<Value, EvalError> {
        let name = node.operator().ok_or(EvalError::NotAnOperator)?;
        let evaluator = self.evaluator;
        let spec = evaluator
            .registry
            .get(name)
            .ok_or_else(|| EvalError::UnknownOperator(name.to_string()))?;
        let args = node.args();

        match &spec.handler {
            OperatorHandler::Lazy(handler) => {
                check_arity(spec, args.len())?;
                handler(args, self)
            }
            OperatorHandler::Eager(handler) => {
                let mut values = Vec::with_capacity(args.len());
                for (index, arg) in args.iter().enumerate() {
                    values.push(self.eval_arg(index, arg));
                }
                check_arity(spec, values.len())?;
                for (index, value) in values.iter().enumerate() {
                    let constraint = spec.signature.constraint_at(index);
                    if !constraint.accepts_value(value) {
                        return Err(EvalError::ArgumentMismatch {
                            operator: spec.name.clone(),
                            index,
                            expected: constraint.as_str(),
                            found: value.kind_name(),
                        });
                    }
                }
                if !spec.signature.flags.contains(OperatorFlags::ACCEPTS_UNKNOWN)
                    && values.iter().any(Value::is_unknown)
                {
                    return Ok(Value::Unknown);
                }
                handler(&values, self)
            }
        }
    }

    fn report(&mut self, node: &Node, err: &EvalError) {
        let path = self.path();
        match err {
            EvalError::UnknownVariable(name) => {
                if self.env.ledger.diagnostics.first_unknown_variable(name) {
                    tracing::warn!(
                        target: "sexp::eval",
                        formula = %self.formula_id,
                        path = %path,
                        variable = %name,
                        "eval.unknown_variable"
                    );
                }
            }
            EvalError::ArgumentMismatch { .. } | EvalError::ArityMismatch { .. } => {
                tracing::warn!(
                    target: "sexp::eval",
                    formula = %self.formula_id,
                    path = %path,
                    offset = node.offset,
                    error = %err,
                    "eval.argument_mismatch"
                );
            }
            other => {
                tracing::warn!(
                    target: "sexp::eval",
                    formula = %self.formula_id,
                    path = %path,
                    offset = node.offset,
                    error = %other,
                    "eval.subtree_unknown"
                );
            }
        }
        self.env.ledger.diagnostics.record_error();
    }
}

fn check_arity(spec: &OperatorSpec, found: usize) -> Result<(), EvalError> {
    if spec.signature.accepts_count(found) {
        Ok(())
    } else {
        Err(EvalError::ArityMismatch {
            operator: spec.name.clone(),
            expected: spec.signature.arity_label(),
            found,
        })
    }
}
