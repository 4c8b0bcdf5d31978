use std::time::Duration;

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::Value;

/// Parses a `HH:mm:ss` span.
pub(crate) fn parse_span(value: &str) -> Result<Duration, String> {
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("Invalid span '{}'. Use HH:mm:ss.", value));
    }
    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|err| format!("Invalid span '{}': {}", value, err))?;
    }
    let [hours, minutes, seconds] = numbers;
    if minutes >= 60 || seconds >= 60 {
        return Err(format!("Invalid span '{}'. Use HH:mm:ss.", value));
    }
    Ok(Duration::from_secs(
        hours
            .saturating_mul(3600)
            .saturating_add(minutes.saturating_mul(60))
            .saturating_add(seconds),
    ))
}

/// `--variable` values: integer-looking text becomes a typed integer.
pub(crate) fn variable_value(raw: &str) -> Value {
    raw.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(raw.to_owned()))
}

/// `--sql` and `--table` values naming a defined environment variable are
/// replaced by that variable's content.
pub(crate) fn resolve_env_indirection(value: &str) -> String {
    std::env::var(value).unwrap_or_else(|_| value.to_owned())
}

pub(crate) fn fresh_session_id() -> String {
    let id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    id.to_lowercase()
}
