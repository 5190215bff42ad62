//! Tools registered by `tackle chat`.

use chrono::Local;
use fasteval::ez_eval;
use tools::{BoxError, FunctionTool, FunctionToolBuilder, Param, Signature, ToolRegistry};
use tracing::warn;

/// Characters `calculate` accepts.
const ALLOWED_CHARACTERS: &str = "0123456789+-*(). /";

const DATETIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Registry holding every builtin that registers cleanly.
pub fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for builder in [calculate_tool(), get_datetime_tool()] {
        if let Err(e) = registry.register_function(builder) {
            warn!(error = %e, "skipping tool");
        }
    }
    registry
}

fn calculate_tool() -> FunctionToolBuilder {
    FunctionTool::builder(
        Signature::new("calculate")
            .doc("Evaluate an arithmetic expression and return the result.")
            .param(
                Param::new::<String>("expression")
                    .describe("arithmetic using digits, + - * / ( ) and spaces, e.g. 3*(4-1)"),
            ),
        |args| calculate(&args.get::<String>("expression")?),
    )
}

fn get_datetime_tool() -> FunctionToolBuilder {
    FunctionTool::builder(
        Signature::new("get_datetime").doc("Get the current local date and time."),
        |_| Ok(get_datetime()),
    )
}

/// Evaluate `expression`, rejecting anything outside plain arithmetic.
pub fn calculate(expression: &str) -> Result<String, BoxError> {
    if let Some(c) = expression.chars().find(|c| !ALLOWED_CHARACTERS.contains(*c)) {
        return Err(format!("Unsupported character included({c})").into());
    }
    if negates_power_base(expression) {
        return Err(
            "ambiguous negative power: write (-2)**2 or -(2**2) instead of -2**2".into(),
        );
    }

    let value = evaluate(expression).map_err(|e| format!("invalid expression: {e}"))?;

    if divides_by_zero(expression) {
        return Err("division by zero".into());
    }
    if !value.is_finite() {
        return Err("result out of range".into());
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Ok(format!("{}", value as i64))
    } else {
        Ok(format!("{value}"))
    }
}

fn evaluate(expression: &str) -> Result<f64, fasteval::Error> {
    let mut no_names = |_: &str, _: Vec<f64>| -> Option<f64> { None };
    ez_eval(&expression.replace("**", "^"), &mut no_names)
}

/// Whether a unary minus sits directly in front of the base of a `**`.
///
/// The evaluator binds unary minus tighter than `^`, the reverse of the
/// usual `-2**2 == -4`.
fn negates_power_base(expression: &str) -> bool {
    let bytes = expression.as_bytes();
    expression
        .match_indices("**")
        .any(|(op, _)| base_is_negated(bytes, op))
}

fn base_is_negated(bytes: &[u8], op: usize) -> bool {
    let mut start = skip_spaces_back(bytes, op);
    if start > 0 && bytes[start - 1] == b')' {
        let mut depth = 0usize;
        while start > 0 {
            start -= 1;
            match bytes[start] {
                b')' => depth += 1,
                b'(' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
    } else {
        while start > 0 && (bytes[start - 1].is_ascii_digit() || bytes[start - 1] == b'.') {
            start -= 1;
        }
    }

    let sign = skip_spaces_back(bytes, start);
    if sign == 0 || bytes[sign - 1] != b'-' {
        return false;
    }
    let before = skip_spaces_back(bytes, sign - 1);
    before == 0 || matches!(bytes[before - 1], b'+' | b'-' | b'*' | b'/' | b'(')
}

fn skip_spaces_back(bytes: &[u8], mut end: usize) -> usize {
    while end > 0 && bytes[end - 1] == b' ' {
        end -= 1;
    }
    end
}

/// Whether any divisor in `expression` evaluates to zero.
fn divides_by_zero(expression: &str) -> bool {
    expression.match_indices('/').any(|(pos, _)| {
        let divisor = divisor_operand(&expression[pos + 1..]);
        matches!(evaluate(divisor), Ok(v) if v == 0.0)
    })
}

/// The operand right of a `/`: everything up to the next operator of equal
/// or lower precedence at the same nesting level.
fn divisor_operand(rest: &str) -> &str {
    let bytes = rest.as_bytes();
    let mut depth = 0usize;
    let mut prev: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'(' => depth += 1,
            b')' if depth == 0 => break,
            b')' => depth -= 1,
            b'*' if bytes.get(i + 1) == Some(&b'*') => {
                prev = Some(b'*');
                i += 2;
                continue;
            }
            b'*' | b'/' if depth == 0 => break,
            b'+' | b'-'
                if depth == 0
                    && prev.is_some_and(|p| p.is_ascii_digit() || p == b'.' || p == b')') =>
            {
                break;
            }
            _ => {}
        }
        if b != b' ' {
            prev = Some(b);
        }
        i += 1;
    }
    &rest[..i]
}

/// Current local time, e.g. `2024/05/01 13:45:00`.
pub fn get_datetime() -> String {
    Local::now().format(DATETIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tools::CallArgs;

    #[test]
    fn calculates_arithmetic() {
        assert_eq!(calculate("3*(4-1)").unwrap(), "9");
        assert_eq!(calculate("2+2").unwrap(), "4");
        assert_eq!(calculate(" 7 / 2 ").unwrap(), "3.5");
        assert_eq!(calculate("2**3").unwrap(), "8");
    }

    #[test]
    fn rejects_characters_outside_the_allow_list() {
        let err = calculate("2^2").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported character included(^)");
        assert!(calculate("__import__('os')").is_err());
    }

    #[test]
    fn negative_power_base_is_rejected() {
        assert!(calculate("-2**2").is_err());
        assert!(calculate("3 * -2 ** 2").is_err());
        assert!(calculate("-(1+1)**2").is_err());
        assert_eq!(calculate("(-2)**2").unwrap(), "4");
        assert_eq!(calculate("-(2**2)").unwrap(), "-4");
        assert_eq!(calculate("2 - 3**2").unwrap(), "-7");
        assert_eq!(calculate("2**-1").unwrap(), "0.5");
        assert_eq!(calculate("2**3**2").unwrap(), "512");
    }

    #[test]
    fn division_by_zero_is_an_error() {
        for expression in ["1/0", "0/0", "1/(1-1)", "5/0*2", "1/(2/0)"] {
            let err = calculate(expression).unwrap_err();
            assert_eq!(err.to_string(), "division by zero", "{expression}");
        }
        assert_eq!(calculate("6/2*3").unwrap(), "9");
        assert_eq!(calculate("1/2-1/2").unwrap(), "0");
    }

    #[test]
    fn overflow_is_reported_separately() {
        let err = calculate("10**400").unwrap_err();
        assert_eq!(err.to_string(), "result out of range");
    }

    #[test]
    fn malformed_expression_is_an_error() {
        assert!(calculate("(1+").is_err());
    }

    #[test]
    fn datetime_has_expected_shape() {
        let now = get_datetime();
        assert_eq!(now.len(), "2024/01/01 00:00:00".len());
        assert_eq!(&now[4..5], "/");
        assert_eq!(&now[13..14], ":");
    }

    #[test]
    fn builtins_register_and_invoke() {
        let registry = registry();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["calculate", "get_datetime"]);

        let out = registry
            .invoke("calculate", CallArgs::new().named("expression", "2+2"))
            .unwrap();
        assert_eq!(out, "4");

        let err = registry
            .invoke("calculate", CallArgs::new().named("expression", "2^2"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported character included(^)");

        let docs = registry.documents();
        assert_eq!(docs[1].function.parameters["properties"], serde_json::json!({}));
        assert!(docs[1].function.parameters.get("required").is_none());
    }
}
