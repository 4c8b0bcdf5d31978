use serde_json::{Map, Value};

use super::patch::ci_get;

/// Renders `{{ expression }}` occurrences against the variable environment.
///
/// Expressions are dotted property paths into `env`. An expression that does
/// not parse, does not resolve, or resolves to a non-scalar is left exactly
/// as written; `{%` tags are never interpreted.
pub(crate) fn render_template(input: &str, env: &Map<String, Value>) -> String {
    let mut rest = input;
    let mut output = String::with_capacity(input.len());

    loop {
        let start = match rest.find("{{") {
            Some(start) => start,
            None => {
                output.push_str(rest);
                break;
            }
        };
        let (before, after_start) = rest.split_at(start);
        output.push_str(before);
        let after = match after_start.strip_prefix("{{") {
            Some(after) => after,
            None => {
                output.push_str(after_start);
                break;
            }
        };
        let end = match after.find("}}") {
            Some(end) => end,
            None => {
                output.push_str("{{");
                output.push_str(after);
                break;
            }
        };
        let (expr_part, after_end) = after.split_at(end);
        if let Some(value) = resolve_expression(expr_part.trim(), env) {
            output.push_str(&value);
        } else {
            output.push_str("{{");
            output.push_str(expr_part);
            output.push_str("}}");
        }
        rest = match after_end.strip_prefix("}}") {
            Some(remaining) => remaining,
            None => {
                output.push_str(after_end);
                break;
            }
        };
    }

    output
}

fn resolve_expression(expr: &str, env: &Map<String, Value>) -> Option<String> {
    if expr.is_empty() || !expr.split('.').all(is_identifier) {
        return None;
    }

    let mut segments = expr.split('.');
    let first = segments.next()?;
    let mut current = ci_get(env, first)?;
    for segment in segments {
        current = ci_get(current.as_object()?, segment)?;
    }

    match current {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn is_identifier(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}
