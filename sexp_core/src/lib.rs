//! Mission scripting core: a small typed S-expression language, its
//! evaluator, and the event and goal machinery that runs formulas every tick.
//!
//! Text is parsed once per mission into immutable [`Formula`] trees. Each tick
//! the [`EventScheduler`] and [`GoalTracker`] evaluate their formulas through
//! an [`Evaluator`] against a host-provided [`GameContext`], a
//! [`VariableStore`] and the [`MissionLedger`].

pub mod context;
pub mod eval;
pub mod events;
pub mod goals;
pub mod ledger;
pub mod node;
mod notification;
mod operators;
pub mod parser;
pub mod registry;
pub mod validate;
mod value;
pub mod variables;

#[cfg(test)]
mod testing;

pub use context::{GameContext, ShipStatus};
pub use eval::{Env, EvalError, Evaluator, Frame, MAX_EVAL_DEPTH};
pub use events::{ChainLink, EventScheduler, EventState, MissionEvent, SchedulerError, UNLIMITED_REPEATS};
pub use goals::{GoalPolicy, GoalStatus, GoalTracker, GoalType, MissionGoal, MissionOutcome};
pub use ledger::{name_key, names_match, Diagnostics, Directive, EventRecord, GoalRecord, MissionLedger};
pub use node::{Atom, Formula, Node, NodeKind, NodePath, UnresolvedOperator};
pub use notification::Notification;
pub use parser::{parse_formula, ParseError, ParseOptions, Parser, SyntaxErrorKind, DEFAULT_MAX_DEPTH};
pub use registry::{
    OperatorFlags, OperatorHandler, OperatorRegistry, OperatorSpec, RegistryError, ReturnType,
    Signature, TypeConstraint,
};
pub use validate::{validate, IssueKind, ValidationIssue};
pub use value::{Truth, Value, SEXP_FALSE, SEXP_KNOWN_FALSE, SEXP_KNOWN_TRUE, SEXP_TRUE};
pub use variables::{
    PersistedVariable, PersistenceScope, PersistenceSnapshot, Variable, VariableError,
    VariableStore, VariableType, VariableValue,
};
