use serde_json::{Map, Value};

use crate::agent::protocol::MeasurementMetadata;

use super::aggregate::to_f64;

/// Renders one job's summary grouped by metadata `source`, descriptions
/// right-padded to a common width.
pub fn render_job_summary(
    job_name: &str,
    metadata: &[MeasurementMetadata],
    results: &Map<String, Value>,
) -> String {
    let mut output = format!("# {}\n", job_name);

    let width = metadata
        .iter()
        .filter(|entry| results.contains_key(&entry.name))
        .map(|entry| entry.short_description.len())
        .max()
        .unwrap_or(0);

    let mut sources: Vec<&str> = Vec::new();
    for entry in metadata {
        if results.contains_key(&entry.name) && !sources.contains(&entry.source.as_str()) {
            sources.push(&entry.source);
        }
    }

    for source in sources {
        output.push_str(&format!("\n## {}:\n", source));
        for entry in metadata {
            if entry.source != source {
                continue;
            }
            let Some(value) = results.get(&entry.name) else {
                continue;
            };
            output.push_str(&format!(
                "{:<width$} {}\n",
                entry.short_description,
                render_value(value, &entry.format),
                width = width
            ));
        }
    }

    output
}

fn render_value(value: &Value, format: &str) -> String {
    if !format.is_empty() && format != "object" {
        return format_number(to_f64(value), format);
    }
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// `n<digits>` hints render as grouped decimals; anything else falls back to
/// the value's default textual form.
fn format_number(value: f64, format: &str) -> String {
    match format
        .strip_prefix('n')
        .and_then(|digits| digits.parse::<usize>().ok())
    {
        Some(decimals) => group_thousands(value, decimals),
        None => value.to_string(),
    }
}

fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = formatted
        .split_once('.')
        .map_or((formatted.as_str(), ""), |(int, frac)| (int, frac));

    let mut grouped = String::new();
    if value.is_sign_negative() {
        grouped.push('-');
    }
    let digits = int_part.len();
    for (index, ch) in int_part.chars().enumerate() {
        if index > 0 && (digits - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if !frac_part.is_empty() {
        grouped.push('.');
        grouped.push_str(frac_part);
    }
    grouped
}
