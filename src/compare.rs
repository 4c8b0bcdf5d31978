//! Side-by-side display of result documents against the current run.
use serde_json::Value;

use crate::engine::results::ExecutionResult;
use crate::error::{AppError, AppResult, ConfigError};

pub fn load_result_file(path: &str) -> AppResult<ExecutionResult> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        AppError::config(ConfigError::CompareRead {
            path: path.to_owned(),
            source: err,
        })
    })?;
    serde_json::from_str(&raw).map_err(|err| {
        AppError::config(ConfigError::CompareParse {
            path: path.to_owned(),
            source: err,
        })
    })
}

/// Prints each job's scalar summary values with one column per baseline file
/// and a final column for the current run.
pub fn print_comparison(current: &ExecutionResult, baselines: &[(String, ExecutionResult)]) {
    for (job_name, job) in &current.job_results.jobs {
        println!("# {}", job_name);
        let mut header = format!("{:<32}", "metric");
        for (label, _) in baselines {
            header.push_str(&format!(" {:>20}", truncate(label, 20)));
        }
        header.push_str(&format!(" {:>20}", "current"));
        println!("{}", header);

        for (metric, value) in &job.results {
            if value.is_array() || value.is_object() {
                continue;
            }
            let mut line = format!("{:<32}", truncate(metric, 32));
            for (_, baseline) in baselines {
                let rendered = baseline
                    .job_results
                    .jobs
                    .get(job_name)
                    .and_then(|baseline_job| baseline_job.results.get(metric))
                    .map_or_else(|| "-".to_owned(), render);
                line.push_str(&format!(" {:>20}", rendered));
            }
            line.push_str(&format!(" {:>20}", render(value)));
            println!("{}", line);
        }
        println!();
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        text
    } else {
        text.get(..limit).unwrap_or(text)
    }
}
