//! `OutputExtractionPostProcessor` (§4.2).

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::model::workflow::NodeKind;
use crate::state::NodeResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputValidationError {
    ControlCharacter(char),
    BidiOrZeroWidth(char),
    TooLarge { limit: usize, actual: usize },
}

impl std::fmt::Display for OutputValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputValidationError::ControlCharacter(c) => {
                write!(f, "output contains disallowed control character U+{:04X}", *c as u32)
            }
            OutputValidationError::BidiOrZeroWidth(c) => write!(
                f,
                "output contains disallowed bidi-override/zero-width character U+{:04X}",
                *c as u32
            ),
            OutputValidationError::TooLarge { limit, actual } => {
                write!(f, "output size {actual} bytes exceeds limit {limit} bytes")
            }
        }
    }
}

fn is_disallowed_control(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{0008}')
        || c == '\u{000B}'
        || c == '\u{000C}'
        || matches!(c, '\u{000E}'..='\u{001F}')
        || c == '\u{007F}'
}

fn is_disallowed_bidi_or_zero_width(c: char) -> bool {
    matches!(c, '\u{202A}'..='\u{202E}')
        || matches!(c, '\u{2066}'..='\u{2069}')
        || matches!(c, '\u{200B}'..='\u{200D}')
        || c == '\u{FEFF}'
}

/// Validates an output string before it is stored into `state.context`
/// (§4.2). TAB/LF/CR are explicitly allowed despite being below U+0020.
pub fn validate_output_string(s: &str, max_bytes: usize) -> Result<(), OutputValidationError> {
    for c in s.chars() {
        if c == '\t' || c == '\n' || c == '\r' {
            continue;
        }
        if is_disallowed_control(c) {
            return Err(OutputValidationError::ControlCharacter(c));
        }
        if is_disallowed_bidi_or_zero_width(c) {
            return Err(OutputValidationError::BidiOrZeroWidth(c));
        }
    }
    if s.len() > max_bytes {
        return Err(OutputValidationError::TooLarge {
            limit: max_bytes,
            actual: s.len(),
        });
    }
    Ok(())
}

/// Recursively validates every string leaf in a JSON output value.
fn validate_json(value: &Json, max_bytes: usize) -> Result<(), OutputValidationError> {
    match value {
        Json::String(s) => validate_output_string(s, max_bytes),
        Json::Array(items) => {
            for item in items {
                validate_json(item, max_bytes)?;
            }
            Ok(())
        }
        Json::Object(map) => {
            for v in map.values() {
                validate_json(v, max_bytes)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Runs the output-extraction stage (§4.2): validates, stores the raw
/// output under the node id, and for Standard nodes with declared
/// `outputParams`, parses the output as JSON and extracts the named
/// parameters into context. Invalid output produces FAILURE.
pub fn run(
    node_id: &str,
    kind: &NodeKind,
    result: NodeResult,
    context: &dashmap::DashMap<String, Json>,
    max_output_bytes: usize,
) -> NodeResult {
    let Some(output) = result.output.clone() else {
        return result;
    };

    if let Err(e) = validate_json(&output, max_output_bytes) {
        return NodeResult::failure(format!("invalid node output: {e}"));
    }

    context.insert(node_id.to_string(), output.clone());

    if let NodeKind::Standard { output_params, .. } = kind {
        if !output_params.is_empty() {
            let parsed: Option<Json> = match &output {
                Json::String(s) => serde_json::from_str(s).ok(),
                other => Some(other.clone()),
            };
            if let Some(Json::Object(map)) = parsed {
                for key in output_params {
                    if let Some(value) = map.get(key) {
                        context.insert(key.clone(), value.clone());
                    }
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_tab_lf_cr() {
        assert!(validate_output_string("a\tb\nc\rd", 1024).is_ok());
    }

    #[test]
    fn rejects_null_byte() {
        let err = validate_output_string("a\u{0000}b", 1024).unwrap_err();
        assert!(matches!(err, OutputValidationError::ControlCharacter(_)));
    }

    #[test]
    fn rejects_bidi_override() {
        let err = validate_output_string("a\u{202E}b", 1024).unwrap_err();
        assert!(matches!(err, OutputValidationError::BidiOrZeroWidth(_)));
    }

    #[test]
    fn rejects_zero_width_space() {
        let err = validate_output_string("a\u{200B}b", 1024).unwrap_err();
        assert!(matches!(err, OutputValidationError::BidiOrZeroWidth(_)));
    }

    #[test]
    fn rejects_oversized_output() {
        let err = validate_output_string(&"x".repeat(10), 5).unwrap_err();
        assert!(matches!(err, OutputValidationError::TooLarge { .. }));
    }

    #[test]
    fn extracts_declared_output_params() {
        let context = dashmap::DashMap::new();
        let kind = NodeKind::Standard {
            prompt: "p".into(),
            agent_id: "a".into(),
            output_params: vec!["title".to_string()],
            rubric_id: None,
            review_config: Default::default(),
            planning_config: Default::default(),
            plan_failure_target: None,
        };
        let result = NodeResult::success(serde_json::json!(r#"{"title": "Hello"}"#));
        let out = run("node1", &kind, result, &context, 4096);
        assert!(out.is_success());
        assert_eq!(
            context.get("title").map(|v| v.value().clone()),
            Some(Json::String("Hello".to_string()))
        );
    }
}
