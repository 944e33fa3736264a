//! Template substitution (C12, §6).
//!
//! The general-purpose `{var}` substitution engine used for `node.prompt`
//! is an external collaborator (Non-goals, §1) — the kernel only declares
//! the `TemplateResolver` trait it consumes. The *different*, narrower
//! substitution `StaticPlanner` performs over its predefined plan body
//! (§4.8) is specified in full and implemented here, since it is part of
//! the planning sub-system itself rather than the pluggable template
//! engine.

use std::collections::HashMap;

use serde_json::Value as Json;

/// Resolves `{var}`-style tokens against a context map. Unresolved tokens
/// are left literal.
pub trait TemplateResolver: Send + Sync {
    fn resolve(&self, template: &str, context: &HashMap<String, Json>) -> String;
}

/// Renders a Rust value the way `StaticPlanner` stringifies non-string
/// context values (§4.8): numbers and bools print in their natural form,
/// strings pass through unquoted, everything else falls back to its JSON
/// representation.
fn stringify(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Number(n) => n.to_string(),
        Json::Bool(b) => b.to_string(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

/// Recursively resolves `{var}` placeholders in `text` from `context`.
/// Used by `StaticPlanner` to fill in plan step bodies (§4.8): strings,
/// map values, and list elements are all walked; unresolved placeholders
/// are left literal rather than erroring.
pub fn resolve_braces(text: &str, context: &HashMap<String, Json>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = text[i + 1..].find('}') {
                let key = &text[i + 1..i + 1 + end];
                if let Some(value) = context.get(key) {
                    out.push_str(&stringify(value));
                    i = i + 1 + end + 1;
                    continue;
                }
            }
        }
        let ch = text[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    let _ = &mut chars;
    out
}

/// Walks an arbitrary JSON value, applying `resolve_braces` to every
/// string leaf (§4.8: "strings, map values, list elements").
pub fn resolve_json(value: &Json, context: &HashMap<String, Json>) -> Json {
    match value {
        Json::String(s) => Json::String(resolve_braces(s, context)),
        Json::Array(items) => {
            Json::Array(items.iter().map(|v| resolve_json(v, context)).collect())
        }
        Json::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_json(v, context));
            }
            Json::Object(out)
        }
        other => other.clone(),
    }
}

/// Minimal default resolver using brace substitution, useful for tests and
/// simple deployments. Callers needing a richer engine (Non-goals, §1)
/// supply their own `TemplateResolver`.
pub struct BraceTemplateResolver;

impl TemplateResolver for BraceTemplateResolver {
    fn resolve(&self, template: &str, context: &HashMap<String, Json>) -> String {
        resolve_braces(template, context)
    }
}
