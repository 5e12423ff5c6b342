use crate::eval::EvalError;
use crate::registry::{OperatorHandler, OperatorRegistry, ReturnType, Signature, TypeConstraint};
use crate::value::Value;

use super::{define, number_arg, text_arg};

const TEXT: &[TypeConstraint] = &[TypeConstraint::String];

pub(super) fn register(registry: &mut OperatorRegistry) {
    define(
        registry,
        "string-equals",
        Signature::new(2, None, ReturnType::Boolean).args(TEXT),
        OperatorHandler::eager(|args, _| {
            let first = text_arg("string-equals", args, 0)?;
            for index in 1..args.len() {
                if text_arg("string-equals", args, index)? != first {
                    return Ok(Value::bool(false));
                }
            }
            Ok(Value::bool(true))
        }),
        "True when every argument equals the first, case-sensitively.",
    );
    define(
        registry,
        "string-concatenate",
        Signature::new(2, None, ReturnType::String).args(TEXT),
        OperatorHandler::eager(|args, _| {
            let mut joined = String::new();
            for index in 0..args.len() {
                joined.push_str(text_arg("string-concatenate", args, index)?);
            }
            Ok(Value::Text(joined))
        }),
        "Arguments joined in order.",
    );
    define(
        registry,
        "string-length",
        Signature::new(1, Some(1), ReturnType::Number).args(TEXT),
        OperatorHandler::eager(|args, _| {
            let text = text_arg("string-length", args, 0)?;
            Ok(Value::Number(text.chars().count() as f64))
        }),
        "Length in characters.",
    );
    define(
        registry,
        "number-to-string",
        Signature::new(1, Some(1), ReturnType::String).args(&[TypeConstraint::Number]),
        OperatorHandler::eager(|args, _| {
            Ok(Value::Text(number_arg("number-to-string", args, 0)?.to_string()))
        }),
        "Decimal text of a number.",
    );
    define(
        registry,
        "string-to-number",
        Signature::new(1, Some(1), ReturnType::Number).args(TEXT),
        OperatorHandler::eager(|args, _| {
            let text = text_arg("string-to-number", args, 0)?;
            match text.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(Value::Number(value)),
                _ => Err(EvalError::domain(
                    "string-to-number",
                    format!("'{text}' is not a number"),
                )),
            }
        }),
        "Parses decimal text; unparsable text is unknown.",
    );
}

#[cfg(test)]
mod tests {
    use crate::testing::Harness;
    use crate::value::Value;

    #[test]
    fn string_operators() {
        let mut h = Harness::new();
        assert!(h.eval(r#"(string-equals "Alpha" "Alpha")"#).is_true());
        assert!(!h.eval(r#"(string-equals "Alpha" "alpha")"#).is_true());
        assert_eq!(
            h.eval(r#"(string-concatenate "Alpha " "1")"#),
            Value::Text("Alpha 1".into())
        );
        assert_eq!(h.eval(r#"(string-length "Delta")"#).as_number(), Some(5.0));
        assert_eq!(h.eval("(number-to-string 42)"), Value::Text("42".into()));
        assert_eq!(h.eval("(number-to-string 2.5)"), Value::Text("2.5".into()));
        assert_eq!(h.eval(r#"(string-to-number " 17 ")"#).as_number(), Some(17.0));
        assert!(h.eval(r#"(string-to-number "seventeen")"#).is_unknown());
    }

    #[test]
    fn text_is_false_in_boolean_context() {
        let mut h = Harness::new();
        assert!(!h.eval(r#"(string-concatenate "a" "b")"#).is_true());
    }
}
