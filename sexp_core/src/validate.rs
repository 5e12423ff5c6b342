//! Static checks of a parsed formula against operator signatures and declared
//! variables.
//!
//! Run after every formula of a mission has been parsed, so that operators
//! registered late and variables declared anywhere in the mission are known.

use std::fmt;

use crate::node::{Atom, Formula, Node, NodeKind, NodePath};
use crate::registry::{OperatorRegistry, TypeConstraint};
use crate::value::Value;
use crate::variables::{VariableStore, VariableType};

#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    UnknownOperator(String),
    TooFewArguments {
        operator: String,
        min: usize,
        found: usize,
    },
    TooManyArguments {
        operator: String,
        max: usize,
        found: usize,
    },
    ArgumentType {
        operator: String,
        index: usize,
        expected: TypeConstraint,
        found: &'static str,
    },
    UndeclaredVariable(String),
    VariableType {
        name: String,
        expected: TypeConstraint,
        found: VariableType,
    },
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::UnknownOperator(name) => write!(f, "unknown operator '{name}'"),
            IssueKind::TooFewArguments { operator, min, found } => {
                write!(f, "'{operator}' needs at least {min} arguments, got {found}")
            }
            IssueKind::TooManyArguments { operator, max, found } => {
                write!(f, "'{operator}' takes at most {max} arguments, got {found}")
            }
            IssueKind::ArgumentType {
                operator,
                index,
                expected,
                found,
            } => write!(f, "'{operator}' argument {index} expects {expected}, got {found}"),
            IssueKind::UndeclaredVariable(name) => write!(f, "variable '@{name}' is not declared"),
            IssueKind::VariableType {
                name,
                expected,
                found,
            } => write!(f, "variable '@{name}' holds {found} values where {expected} is expected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub formula_id: String,
    pub path: NodePath,
    pub offset: usize,
    pub kind: IssueKind,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} (byte {}): {}",
            self.formula_id, self.path, self.offset, self.kind
        )
    }
}

/// Checks `formula` and returns every issue found. Variable checks are
/// skipped when `variables` is `None`.
pub fn validate(
    formula_id: &str,
    formula: &Formula,
    registry: &OperatorRegistry,
    variables: Option<&VariableStore>,
) -> Vec<ValidationIssue> {
    let mut checker = Checker {
        formula_id,
        registry,
        variables,
        issues: Vec::new(),
    };
    let mut pending = vec![(formula.root(), NodePath::root())];
    while let Some((node, path)) = pending.pop() {
        match &node.kind {
            NodeKind::List(children) => {
                checker.check_application(node, &path);
                for (index, child) in children.iter().enumerate().skip(1).rev() {
                    pending.push((child, path.child(index)));
                }
            }
            NodeKind::Atom(Atom::Variable(name)) if path.is_root() => {
                checker.check_declared(name, node, &path);
            }
            NodeKind::Atom(_) => {}
        }
    }
    checker.issues
}

struct Checker<'a> {
    formula_id: &'a str,
    registry: &'a OperatorRegistry,
    variables: Option<&'a VariableStore>,
    issues: Vec<ValidationIssue>,
}

impl Checker<'_> {
    fn push(&mut self, node: &Node, path: &NodePath, kind: IssueKind) {
        self.issues.push(ValidationIssue {
            formula_id: self.formula_id.to_string(),
            path: path.clone(),
            offset: node.offset,
            kind,
        });
    }

    fn check_application(&mut self, node: &Node, path: &NodePath) {
        let Some(name) = node.operator() else {
            return;
        };
        let Some(spec) = self.registry.get(name) else {
            self.push(node, path, IssueKind::UnknownOperator(name.to_string()));
            return;
        };
        let signature = &spec.signature;
        let args = node.args();

        if args.len() < signature.min_args {
            self.push(
                node,
                path,
                IssueKind::TooFewArguments {
                    operator: spec.name.clone(),
                    min: signature.min_args,
                    found: args.len(),
                },
            );
        }
        if let Some(max) = signature.max_args.filter(|max| args.len() > *max) {
            self.push(
                node,
                path,
                IssueKind::TooManyArguments {
                    operator: spec.name.clone(),
                    max,
                    found: args.len(),
                },
            );
        }

        for (index, arg) in args.iter().enumerate() {
            let arg_path = path.child(index + 1);
            let expected = signature.constraint_at(index);
            let found = match (&arg.kind, expected) {
                (NodeKind::Atom(Atom::Variable(name)), TypeConstraint::VariableRef) => {
                    self.check_declared(name, arg, &arg_path);
                    None
                }
                (NodeKind::Atom(atom), TypeConstraint::VariableRef) => Some(atom.kind_name()),
                (NodeKind::List(_), TypeConstraint::VariableRef) => Some("list"),
                (NodeKind::Atom(Atom::Number(n)), _) => {
                    (!expected.accepts_value(&Value::Number(*n))).then_some("number")
                }
                (NodeKind::Atom(Atom::Text(text)), _) => {
                    (!expected.accepts_value(&Value::Text(text.clone()))).then_some("string")
                }
                (NodeKind::Atom(Atom::Variable(name)), _) => {
                    self.check_variable(name, expected, arg, &arg_path);
                    None
                }
                (NodeKind::Atom(Atom::Operator(_)), _) => Some("operator"),
                (NodeKind::List(_), _) => arg
                    .operator()
                    .and_then(|nested| self.registry.get(nested))
                    .map(|nested| nested.signature.return_type)
                    .filter(|ty| !expected.accepts_return(*ty))
                    .map(|ty| ty.as_str()),
            };
            if let Some(found) = found {
                self.push(
                    arg,
                    &arg_path,
                    IssueKind::ArgumentType {
                        operator: spec.name.clone(),
                        index,
                        expected,
                        found,
                    },
                );
            }
        }
    }

    fn check_declared(&mut self, name: &str, node: &Node, path: &NodePath) {
        if let Some(store) = self.variables {
            if !store.contains(name) {
                self.push(node, path, IssueKind::UndeclaredVariable(name.to_string()));
            }
        }
    }

    fn check_variable(&mut self, name: &str, expected: TypeConstraint, node: &Node, path: &NodePath) {
        let Some(store) = self.variables else {
            return;
        };
        let Some(entry) = store.entry(name) else {
            self.push(node, path, IssueKind::UndeclaredVariable(name.to_string()));
            return;
        };
        let sample = match entry.value_type {
            VariableType::Number => Value::Number(0.0),
            VariableType::String => Value::Text(String::new()),
        };
        if !expected.accepts_value(&sample) {
            let found = entry.value_type;
            self.push(
                node,
                path,
                IssueKind::VariableType {
                    name: name.to_string(),
                    expected,
                    found,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseOptions, Parser};
    use crate::variables::{PersistenceScope, VariableValue};

    fn issues(text: &str, variables: Option<&VariableStore>) -> Vec<IssueKind> {
        let registry = OperatorRegistry::builtin();
        let parser = Parser::with_options(
            &registry,
            ParseOptions {
                allow_unknown_operators: true,
                ..ParseOptions::default()
            },
        );
        let formula = parser.parse(text).unwrap();
        validate("goal", &formula, &registry, variables)
            .into_iter()
            .map(|issue| issue.kind)
            .collect()
    }

    fn store() -> VariableStore {
        let mut store = VariableStore::new();
        store
            .declare(
                "callsign",
                VariableType::String,
                VariableValue::String("Alpha".into()),
                PersistenceScope::Local,
            )
            .unwrap();
        store
    }

    #[test]
    fn clean_formula_has_no_issues() {
        assert!(issues(
            "(and (is-destroyed \"Enemy Fighter\") (> (mission-time) 30))",
            None
        )
        .is_empty());
    }

    #[test]
    fn arity_issues() {
        assert_eq!(
            issues("(not (true) (true))", None),
            vec![IssueKind::TooManyArguments {
                operator: "not".into(),
                max: 1,
                found: 2,
            }]
        );
        assert_eq!(
            issues("(> 1)", None),
            vec![IssueKind::TooFewArguments {
                operator: ">".into(),
                min: 2,
                found: 1,
            }]
        );
    }

    #[test]
    fn static_type_issues() {
        assert_eq!(
            issues("(+ 1 (string-concatenate \"a\" \"b\"))", None),
            vec![IssueKind::ArgumentType {
                operator: "+".into(),
                index: 1,
                expected: TypeConstraint::Number,
                found: "string",
            }]
        );
        assert_eq!(
            issues("(is-destroyed 5)", None),
            vec![IssueKind::ArgumentType {
                operator: "is-destroyed".into(),
                index: 0,
                expected: TypeConstraint::ShipRef,
                found: "number",
            }]
        );
        assert_eq!(
            issues("(modify-variable \"x\" 1)", None),
            vec![IssueKind::ArgumentType {
                operator: "modify-variable".into(),
                index: 0,
                expected: TypeConstraint::VariableRef,
                found: "string",
            }]
        );
    }

    #[test]
    fn variable_issues_need_a_store() {
        let store = store();
        assert!(issues("(> @callsign 1)", None).is_empty());
        assert_eq!(
            issues("(> @callsign @ghost)", Some(&store)),
            vec![
                IssueKind::VariableType {
                    name: "callsign".into(),
                    expected: TypeConstraint::Number,
                    found: VariableType::String,
                },
                IssueKind::UndeclaredVariable("ghost".into()),
            ]
        );
    }

    #[test]
    fn unknown_operators_are_reported_with_path() {
        let registry = OperatorRegistry::builtin();
        let parser = Parser::with_options(
            &registry,
            ParseOptions {
                allow_unknown_operators: true,
                ..ParseOptions::default()
            },
        );
        let formula = parser.parse("(or (false) (cargo-known \"Freighter\"))").unwrap();
        let found = validate("Scan Cargo", &formula, &registry, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, NodePath(vec![2]));
        assert_eq!(
            found[0].to_string(),
            "Scan Cargo at /2 (byte 12): unknown operator 'cargo-known'"
        );
    }
}
