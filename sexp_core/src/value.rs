//! Evaluation results and the truth-value encoding shared by every operator.

use std::fmt;

/// Plain "true" returned by boolean operators.
pub const SEXP_TRUE: f64 = 1.0;
/// Plain "false" returned by boolean operators.
pub const SEXP_FALSE: f64 = 0.0;
/// True, and guaranteed to stay true for the rest of the mission.
pub const SEXP_KNOWN_TRUE: f64 = -32766.0;
/// False, and guaranteed never to become true for the rest of the mission.
pub const SEXP_KNOWN_FALSE: f64 = -32767.0;

/// Result of evaluating a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    /// Referenced game state could not be resolved, or the subtree failed.
    Unknown,
}

/// Five-way reading of a [`Value`] in boolean context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Truth {
    True,
    False,
    KnownTrue,
    KnownFalse,
    Unknown,
}

impl Truth {
    pub fn is_true(self) -> bool {
        matches!(self, Truth::True | Truth::KnownTrue)
    }

    /// True when the value can never change again.
    pub fn is_settled(self) -> bool {
        matches!(self, Truth::KnownTrue | Truth::KnownFalse)
    }

    pub fn negate(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::KnownTrue => Truth::KnownFalse,
            Truth::KnownFalse => Truth::KnownTrue,
            Truth::Unknown => Truth::Unknown,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Truth::True => Value::Number(SEXP_TRUE),
            Truth::False => Value::Number(SEXP_FALSE),
            Truth::KnownTrue => Value::Number(SEXP_KNOWN_TRUE),
            Truth::KnownFalse => Value::Number(SEXP_KNOWN_FALSE),
            Truth::Unknown => Value::Unknown,
        }
    }
}

impl Value {
    pub fn bool(flag: bool) -> Value {
        Value::Number(if flag { SEXP_TRUE } else { SEXP_FALSE })
    }

    pub fn truth(&self) -> Truth {
        match self {
            Value::Number(n) if n.is_nan() => Truth::Unknown,
            Value::Number(n) if *n == SEXP_FALSE => Truth::False,
            Value::Number(n) if *n == SEXP_KNOWN_FALSE => Truth::KnownFalse,
            Value::Number(n) if *n == SEXP_KNOWN_TRUE => Truth::KnownTrue,
            Value::Number(_) => Truth::True,
            Value::Text(_) => Truth::False,
            Value::Unknown => Truth::Unknown,
        }
    }

    pub fn is_true(&self) -> bool {
        self.truth().is_true()
    }

    pub fn is_unknown(&self) -> bool {
        self.truth() == Truth::Unknown
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Unknown => "unknown",
        }
    }
}

impl From<Truth> for Value {
    fn from(truth: Truth) -> Self {
        truth.into_value()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(text) => write!(f, "{text:?}"),
            Value::Unknown => f.write_str("<unknown>"),
        }
    }
}
