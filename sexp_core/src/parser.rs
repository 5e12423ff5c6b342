//! Text → [`Formula`] conversion.
//!
//! The parser checks structure only: balanced parentheses, operator heads,
//! literal well-formedness and nesting depth. Argument counts and types are
//! left to [`crate::validate`], which runs once every formula of a mission has
//! been parsed.

use std::fmt;

use thiserror::Error;

use crate::node::{Atom, Formula, Node, NodeKind, UnresolvedOperator};
use crate::registry::OperatorRegistry;

pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Accept operator heads missing from the registry and record them in
    /// [`Formula::unresolved`] instead of failing.
    pub allow_unknown_operators: bool,
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            allow_unknown_operators: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyntaxErrorKind {
    #[error("formula is empty")]
    Empty,
    #[error("unclosed '('")]
    Unclosed,
    #[error("unexpected ')'")]
    UnexpectedClose,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid escape '\\{0}' in string literal")]
    InvalidEscape(char),
    #[error("empty list '()'")]
    EmptyList,
    #[error("list must start with an operator name")]
    OperatorExpected,
    #[error("invalid numeric literal '{0}'")]
    InvalidNumber(String),
    #[error("'@' must be followed by a variable name")]
    EmptyVariable,
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
    #[error("unexpected input after the end of the formula")]
    TrailingInput,
}

/// Syntax error with the byte offset it was detected at and the name of the
/// nearest enclosing operator, when there is one.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("syntax error at byte {offset}{}: {kind}", OperatorContext(.operator))]
pub struct ParseError {
    pub kind: SyntaxErrorKind,
    pub offset: usize,
    pub operator: Option<String>,
}

struct OperatorContext<'a>(&'a Option<String>);

impl fmt::Display for OperatorContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(name) => write!(f, " in '{name}'"),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Str(String),
    Bare(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Spanned {
    token: Token,
    offset: usize,
}

fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            ';' => {
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' => {
                chars.next();
                tokens.push(Spanned {
                    token: Token::Open,
                    offset,
                });
            }
            ')' => {
                chars.next();
                tokens.push(Spanned {
                    token: Token::Close,
                    offset,
                });
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((escape_offset, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, '"')) => text.push('"'),
                            Some((_, '\\')) => text.push('\\'),
                            Some((_, other)) => {
                                return Err(ParseError {
                                    kind: SyntaxErrorKind::InvalidEscape(other),
                                    offset: escape_offset,
                                    operator: None,
                                })
                            }
                            None => break,
                        },
                        other => text.push(other),
                    }
                }
                if !closed {
                    return Err(ParseError {
                        kind: SyntaxErrorKind::UnterminatedString,
                        offset,
                        operator: None,
                    });
                }
                tokens.push(Spanned {
                    token: Token::Str(text),
                    offset,
                });
            }
            _ => {
                let mut text = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';') {
                        break;
                    }
                    text.push(c);
                    chars.next();
                }
                tokens.push(Spanned {
                    token: Token::Bare(text),
                    offset,
                });
            }
        }
    }

    Ok(tokens)
}

fn looks_numeric(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-' | '+' | '.') => matches!(chars.next(), Some(c) if c.is_ascii_digit() || c == '.'),
        _ => false,
    }
}

/// Atom for a bare token in argument position.
fn bare_atom(text: &str, offset: usize) -> Result<Atom, ParseError> {
    if let Some(name) = text.strip_prefix('@') {
        if name.is_empty() {
            return Err(ParseError {
                kind: SyntaxErrorKind::EmptyVariable,
                offset,
                operator: None,
            });
        }
        return Ok(Atom::Variable(name.to_string()));
    }
    if looks_numeric(text) {
        return match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Atom::Number(value)),
            _ => Err(ParseError {
                kind: SyntaxErrorKind::InvalidNumber(text.to_string()),
                offset,
                operator: None,
            }),
        };
    }
    // Unquoted symbols in argument position are string shorthand.
    Ok(Atom::Text(text.to_string()))
}

struct OpenList {
    offset: usize,
    children: Vec<Node>,
}

impl OpenList {
    fn operator(&self) -> Option<&str> {
        match self.children.first().map(|node| &node.kind) {
            Some(NodeKind::Atom(Atom::Operator(name))) => Some(name.as_str()),
            _ => None,
        }
    }
}

pub struct Parser<'r> {
    registry: &'r OperatorRegistry,
    options: ParseOptions,
}

impl<'r> Parser<'r> {
    pub fn new(registry: &'r OperatorRegistry) -> Self {
        Self::with_options(registry, ParseOptions::default())
    }

    pub fn with_options(registry: &'r OperatorRegistry, options: ParseOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    pub fn parse(&self, input: &str) -> Result<Formula, ParseError> {
        let tokens = tokenize(input)?;
        let mut stack: Vec<OpenList> = Vec::new();
        let mut root: Option<Node> = None;
        let mut unresolved = Vec::new();

        for Spanned { token, offset } in tokens {
            if root.is_some() {
                return Err(ParseError {
                    kind: SyntaxErrorKind::TrailingInput,
                    offset,
                    operator: None,
                });
            }
            let fail = |kind: SyntaxErrorKind, stack: &[OpenList]| ParseError {
                kind,
                offset,
                operator: enclosing_operator(stack),
            };

            let completed = match token {
                Token::Open => {
                    if stack.last().is_some_and(|open| open.children.is_empty()) {
                        return Err(fail(SyntaxErrorKind::OperatorExpected, &stack));
                    }
                    if stack.len() >= self.options.max_depth {
                        return Err(fail(
                            SyntaxErrorKind::TooDeep(self.options.max_depth),
                            &stack,
                        ));
                    }
                    stack.push(OpenList {
                        offset,
                        children: Vec::new(),
                    });
                    None
                }
                Token::Close => {
                    let Some(open) = stack.pop() else {
                        return Err(fail(SyntaxErrorKind::UnexpectedClose, &stack));
                    };
                    if open.children.is_empty() {
                        return Err(ParseError {
                            kind: SyntaxErrorKind::EmptyList,
                            offset: open.offset,
                            operator: enclosing_operator(&stack),
                        });
                    }
                    Some(Node::list(open.children, open.offset))
                }
                Token::Str(text) => {
                    if stack.last().is_some_and(|open| open.children.is_empty()) {
                        return Err(fail(SyntaxErrorKind::OperatorExpected, &stack));
                    }
                    Some(Node::atom(Atom::Text(text), offset))
                }
                Token::Bare(text) => {
                    let is_head = stack.last().is_some_and(|open| open.children.is_empty());
                    if is_head {
                        if text.starts_with('@') || looks_numeric(&text) {
                            return Err(fail(SyntaxErrorKind::OperatorExpected, &stack));
                        }
                        if !self.registry.contains(&text) {
                            if !self.options.allow_unknown_operators {
                                return Err(fail(
                                    SyntaxErrorKind::UnknownOperator(text),
                                    &stack,
                                ));
                            }
                            tracing::debug!(
                                target: "sexp::parse",
                                operator = %text,
                                offset,
                                "parse.unresolved_operator"
                            );
                            unresolved.push(UnresolvedOperator {
                                name: text.clone(),
                                offset,
                            });
                        }
                        Some(Node::atom(Atom::Operator(text), offset))
                    } else {
                        let atom = bare_atom(&text, offset).map_err(|err| ParseError {
                            operator: enclosing_operator(&stack),
                            ..err
                        })?;
                        Some(Node::atom(atom, offset))
                    }
                }
            };

            if let Some(node) = completed {
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(ParseError {
                kind: SyntaxErrorKind::Unclosed,
                offset: open.offset,
                operator: enclosing_operator(&stack),
            });
        }

        root.map(|node| Formula::new(node, unresolved))
            .ok_or(ParseError {
                kind: SyntaxErrorKind::Empty,
                offset: 0,
                operator: None,
            })
    }
}

fn enclosing_operator(stack: &[OpenList]) -> Option<String> {
    stack
        .iter()
        .rev()
        .find_map(|open| open.operator().map(str::to_string))
}

/// Parses `input` against `registry` with default options.
pub fn parse_formula(input: &str, registry: &OperatorRegistry) -> Result<Formula, ParseError> {
    Parser::new(registry).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> std::sync::Arc<OperatorRegistry> {
        OperatorRegistry::builtin()
    }

    #[test]
    fn parses_nested_formula_with_all_atom_kinds() {
        let registry = registry();
        let formula = parse_formula(
            r#"(and (is-destroyed "Enemy Fighter") (> @player-score -12.5))"#,
            &registry,
        )
        .unwrap();
        let root = formula.root();
        assert_eq!(root.operator(), Some("and"));
        assert_eq!(root.args().len(), 2);
        let compare = &root.args()[1];
        assert_eq!(compare.args()[0].variable_name(), Some("player-score"));
        assert_eq!(compare.args()[1].as_atom(), Some(&Atom::Number(-12.5)));
        assert_eq!(
            root.args()[0].args()[0].as_atom(),
            Some(&Atom::Text("Enemy Fighter".into()))
        );
    }

    #[test]
    fn comments_and_whitespace_are_ignored() {
        let registry = registry();
        let formula = parse_formula(
            "; objective check\n(>\n  (mission-time) ; seconds\n  30)",
            &registry,
        )
        .unwrap();
        assert_eq!(formula.to_string(), "(> (mission-time) 30)");
    }

    #[test]
    fn unclosed_list_reports_open_offset_and_operator() {
        let registry = registry();
        let err = parse_formula("(and (true) (> 1 2)", &registry).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::Unclosed);
        assert_eq!(err.offset, 0);
        assert_eq!(err.operator.as_deref(), Some("and"));
    }

    #[test]
    fn stray_close_is_rejected() {
        let registry = registry();
        let err = parse_formula("(true))", &registry).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::TrailingInput);
        assert_eq!(err.offset, 6);
        let err = parse_formula(")", &registry).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedClose);
    }

    #[test]
    fn bad_literal_reports_enclosing_operator() {
        let registry = registry();
        let err = parse_formula("(or (> 1 2x))", &registry).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::InvalidNumber("2x".into()));
        assert_eq!(err.offset, 9);
        assert_eq!(err.operator.as_deref(), Some(">"));
        assert_eq!(
            err.to_string(),
            "syntax error at byte 9 in '>': invalid numeric literal '2x'"
        );
    }

    #[test]
    fn structural_errors() {
        let registry = registry();
        let cases = [
            ("", SyntaxErrorKind::Empty),
            ("()", SyntaxErrorKind::EmptyList),
            ("((true))", SyntaxErrorKind::OperatorExpected),
            ("(\"and\" 1)", SyntaxErrorKind::OperatorExpected),
            ("(@x 1)", SyntaxErrorKind::OperatorExpected),
            ("(+ @ 1)", SyntaxErrorKind::EmptyVariable),
            ("(send-message \"a", SyntaxErrorKind::UnterminatedString),
            ("(string-equals \"a\\n\" \"b\")", SyntaxErrorKind::InvalidEscape('n')),
        ];
        for (input, expected) in cases {
            let err = parse_formula(input, &registry).unwrap_err();
            assert_eq!(err.kind, expected, "input: {input}");
        }
    }

    #[test]
    fn unknown_operator_is_fatal_unless_permitted() {
        let registry = registry();
        let err = parse_formula("(and (warp-drive-ready \"Alpha 1\") (true))", &registry)
            .unwrap_err();
        assert_eq!(
            err.kind,
            SyntaxErrorKind::UnknownOperator("warp-drive-ready".into())
        );

        let parser = Parser::with_options(
            &registry,
            ParseOptions {
                allow_unknown_operators: true,
                ..ParseOptions::default()
            },
        );
        let formula = parser
            .parse("(and (warp-drive-ready \"Alpha 1\") (true))")
            .unwrap();
        assert_eq!(
            formula.unresolved(),
            &[UnresolvedOperator {
                name: "warp-drive-ready".into(),
                offset: 6,
            }]
        );
    }

    #[test]
    fn depth_limit_is_enforced() {
        let registry = registry();
        let parser = Parser::with_options(
            &registry,
            ParseOptions {
                max_depth: 3,
                ..ParseOptions::default()
            },
        );
        assert!(parser.parse("(not (not (true)))").is_ok());
        let err = parser.parse("(not (not (not (true))))").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::TooDeep(3));
    }

    #[test]
    fn symbols_in_argument_position_are_strings() {
        let registry = registry();
        let formula = parse_formula("(is-destroyed Alpha)", &registry).unwrap();
        assert_eq!(formula.to_string(), "(is-destroyed \"Alpha\")");
    }

    #[test]
    fn serializer_output_is_canonical() {
        let registry = registry();
        let formula = parse_formula(
            "(when  (string-equals @callsign Alpha) ; greet\n  (send-message \"Command\" \"Say \\\"hi\\\"\")\n  (modify-variable @n -2.5))",
            &registry,
        )
        .unwrap();
        insta::assert_snapshot!(
            formula.to_string(),
            @r#"(when (string-equals @callsign "Alpha") (send-message "Command" "Say \"hi\"") (modify-variable @n -2.5))"#
        );
    }
}
