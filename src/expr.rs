//! Minimal condition-expression evaluator shared by the Loop executor
//! (§4.14) and `Conditional` transition rules (§3 `TransitionRule`).
//!
//! Deliberately tiny: `<`, `>`, `==` comparing numeric or equatable values
//! resolved from the context map, plus bare boolean or context-boolean
//! references. Unknown tokens evaluate to false. Richer expressions should
//! live in a separate evaluator rather than expanding this one (§9 open
//! question).

use std::collections::HashMap;

use serde_json::Value as Json;

fn resolve_operand(token: &str, context: &HashMap<String, Json>) -> Option<Json> {
    let token = token.trim();
    if let Ok(n) = token.parse::<f64>() {
        return Some(Json::from(n));
    }
    match token {
        "true" => return Some(Json::Bool(true)),
        "false" => return Some(Json::Bool(false)),
        _ => {}
    }
    // A bareword that isn't a context key is a string literal (e.g. the
    // `done` in `status==done`), not a missing lookup.
    context.get(token).cloned().or_else(|| Some(Json::String(token.to_string())))
}

fn as_f64(value: &Json) -> Option<f64> {
    match value {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

/// Evaluates `expression` against `context`. Returns `false` for anything
/// it doesn't understand rather than erroring (§4.14).
pub fn evaluate(expression: &str, context: &HashMap<String, Json>) -> bool {
    let expression = expression.trim();

    for op in ["==", "<", ">"] {
        if let Some(idx) = expression.find(op) {
            let lhs = &expression[..idx];
            let rhs = &expression[idx + op.len()..];
            let Some(lhs_val) = resolve_operand(lhs, context) else {
                return false;
            };
            let Some(rhs_val) = resolve_operand(rhs, context) else {
                return false;
            };
            return match op {
                "==" => lhs_val == rhs_val,
                "<" => match (as_f64(&lhs_val), as_f64(&rhs_val)) {
                    (Some(l), Some(r)) => l < r,
                    _ => false,
                },
                ">" => match (as_f64(&lhs_val), as_f64(&rhs_val)) {
                    (Some(l), Some(r)) => l > r,
                    _ => false,
                },
                _ => unreachable!(),
            };
        }
    }

    match resolve_operand(expression, context) {
        Some(Json::Bool(b)) => b,
        _ => false,
    }
}
