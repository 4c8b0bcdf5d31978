use serde_json::{Map, Value};

use crate::agent::protocol::{Measurement, MeasurementMetadata};

use super::operation::Operation;

/// Pre-aggregation pass: measurements whose metadata declares the `json`
/// format carry serialized payloads; parse them and rewrite the format to
/// `object` so the aggregation below retains them structurally.
pub fn normalize(metadata: &mut [MeasurementMetadata], streams: &mut [Vec<Measurement>]) {
    for entry in metadata.iter_mut() {
        if entry.format != "json" {
            continue;
        }
        for stream in streams.iter_mut() {
            for measurement in stream.iter_mut() {
                if measurement.name != entry.name {
                    continue;
                }
                if let Value::String(text) = &measurement.value
                    && let Ok(parsed) = serde_json::from_str::<Value>(text)
                {
                    measurement.value = parsed;
                }
            }
        }
        entry.format = "object".to_owned();
    }
}

/// Applies each metadata entry's `aggregate` operation over one agent's
/// measurement stream. Measurements without a metadata entry are dropped from
/// the summary.
pub fn aggregate_agent(
    metadata: &[MeasurementMetadata],
    measurements: &[Measurement],
) -> Map<String, Value> {
    let mut results = Map::new();
    for entry in metadata {
        let values: Vec<Value> = measurements
            .iter()
            .filter(|measurement| measurement.name == entry.name)
            .map(|measurement| measurement.value.clone())
            .collect();
        if values.is_empty() {
            continue;
        }
        results.insert(
            entry.name.clone(),
            summarize(entry.aggregate, &entry.format, &values),
        );
    }
    results
}

/// Reduces per-agent summaries into one. A single agent's summary is
/// returned verbatim; otherwise each metadata entry's `reduce` operation runs
/// over the flattened per-agent values.
pub fn reduce_agents(
    metadata: &[MeasurementMetadata],
    summaries: &[Map<String, Value>],
) -> Map<String, Value> {
    if summaries.len() == 1 {
        return summaries.first().cloned().unwrap_or_default();
    }

    let mut results = Map::new();
    for entry in metadata {
        let values: Vec<Value> = summaries
            .iter()
            .filter_map(|summary| summary.get(&entry.name))
            .flat_map(|value| match value {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            })
            .collect();
        if values.is_empty() {
            continue;
        }
        results.insert(
            entry.name.clone(),
            summarize(entry.reduce, &entry.format, &values),
        );
    }
    results
}

fn summarize(op: Operation, format: &str, values: &[Value]) -> Value {
    let summary = apply_operation(op, values);
    if !format.is_empty() && format != "object" && !summary.is_array() {
        number_value(to_f64(&summary))
    } else {
        summary
    }
}

fn apply_operation(op: Operation, values: &[Value]) -> Value {
    match op {
        Operation::All => Value::Array(values.to_vec()),
        Operation::First => values.first().cloned().unwrap_or(Value::Null),
        Operation::Last => values.last().cloned().unwrap_or(Value::Null),
        Operation::Count => Value::from(values.len() as u64),
        Operation::Avg => {
            let numbers = numeric(values);
            let count = numbers.len().max(1) as f64;
            number_value(numbers.iter().sum::<f64>() / count)
        }
        Operation::Sum => number_value(numeric(values).iter().sum()),
        Operation::Max => number_value(numeric(values).iter().copied().fold(f64::MIN, f64::max)),
        Operation::Min => number_value(numeric(values).iter().copied().fold(f64::MAX, f64::min)),
        Operation::Median => {
            let mut numbers = numeric(values);
            numbers.sort_unstable_by(f64::total_cmp);
            number_value(median(&numbers))
        }
        Operation::Delta => {
            let numbers = numeric(values);
            let max = numbers.iter().copied().fold(f64::MIN, f64::max);
            let min = numbers.iter().copied().fold(f64::MAX, f64::min);
            number_value(max - min)
        }
    }
}

/// 50th percentile over a sorted series: `nth = ceil(len * 50 / 100)`, the
/// element at `nth` when one exists past it, zero otherwise.
fn median(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    let nth = len.saturating_mul(50).div_ceil(100);
    if len > nth {
        sorted.get(nth).copied().unwrap_or(0.0)
    } else {
        0.0
    }
}

fn numeric(values: &[Value]) -> Vec<f64> {
    values.iter().map(to_f64).collect()
}

pub(super) fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse().unwrap_or(0.0),
        Value::Bool(flag) => {
            if *flag {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn number_value(value: f64) -> Value {
    // Integral doubles serialize without a trailing fraction.
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}
