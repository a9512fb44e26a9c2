//! `${resource.output}` placeholders inside config payloads

use crate::error::{GraphError, Result};
use crate::types::{Reference, ResourceSpec};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// `${...}`, or the escaped form `$${...}` which stands for a literal `${...}`
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$?\$\{([^}]*)\}").expect("placeholder pattern is valid"));

/// Reference text of a match, None when the match is escaped
fn reference_text<'s>(caps: &regex::Captures<'s>) -> Option<&'s str> {
    let whole = caps.get(0)?.as_str();
    if whole.starts_with("$$") {
        return None;
    }
    caps.get(1).map(|m| m.as_str())
}

/// Every reference a resource makes, inputs first, then placeholders.
///
/// Duplicates are dropped, keeping the first occurrence.
pub fn references(spec: &ResourceSpec) -> Result<Vec<Reference>> {
    let mut refs: Vec<Reference> = Vec::new();
    for reference in spec.inputs.values() {
        if !refs.contains(reference) {
            refs.push(reference.clone());
        }
    }

    let mut raw = Vec::new();
    collect_placeholders(&spec.config, &mut raw);
    for text in raw {
        let reference = Reference::parse(text.trim()).ok_or_else(|| GraphError::InvalidReference {
            resource: spec.name.clone(),
            text: text.clone(),
        })?;
        if !refs.contains(&reference) {
            refs.push(reference);
        }
    }

    Ok(refs)
}

fn collect_placeholders(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            out.extend(
                PLACEHOLDER
                    .captures_iter(s)
                    .filter_map(|c| reference_text(&c).map(str::to_string)),
            );
        }
        Value::Array(items) => items.iter().for_each(|v| collect_placeholders(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_placeholders(v, out)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Replace placeholders in `value` using `lookup`.
///
/// A string that is exactly one placeholder becomes the looked-up value as-is;
/// placeholders embedded in longer strings are rendered as text.
pub fn render<F>(value: &Value, lookup: &mut F) -> Result<Value>
where
    F: FnMut(&str) -> Result<Value>,
{
    match value {
        Value::String(s) => render_str(s, lookup),
        Value::Array(items) => items
            .iter()
            .map(|v| render(v, lookup))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (key, v) in map {
                rendered.insert(key.clone(), render(v, lookup)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}

fn render_str<F>(s: &str, lookup: &mut F) -> Result<Value>
where
    F: FnMut(&str) -> Result<Value>,
{
    if let Some(caps) = PLACEHOLDER.captures(s)
        && caps[0].len() == s.len()
        && let Some(text) = reference_text(&caps)
    {
        return lookup(text.trim());
    }

    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(s) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        out.push_str(&s[last..whole.start]);
        match reference_text(&caps) {
            // drop the escaping `$`
            None => out.push_str(&s[whole.start + 1..whole.end]),
            Some(text) => match lookup(text.trim())? {
                Value::String(value) => out.push_str(&value),
                other => out.push_str(&other.to_string()),
            },
        }
        last = whole.end;
    }
    out.push_str(&s[last..]);
    Ok(Value::String(out))
}
