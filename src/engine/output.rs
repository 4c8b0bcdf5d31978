use std::path::PathBuf;

use tracing::info;

use crate::error::AppResult;
use crate::measurements::render_job_summary;
use crate::sinks;
use crate::sinks::db::BenchmarkRow;

use super::RunSettings;
use super::results::{ExecutionResult, strip_document};

/// Trace file destination: `options.traceOutput` or the job name, suffixed
/// with a timestamp when the name does not already carry the extension.
/// Windows agents produce `.etl.zip` under `collect`, other agents
/// `.trace.zip`, and plain runtime traces `.nettrace`.
pub(super) fn trace_destination(
    job_name: &str,
    trace_output: Option<&str>,
    collect: bool,
    os: &str,
) -> PathBuf {
    let destination = trace_output.unwrap_or(job_name);
    let extension = if collect {
        if os.eq_ignore_ascii_case("windows") {
            ".etl.zip"
        } else {
            ".trace.zip"
        }
    } else {
        ".nettrace"
    };
    if destination.ends_with(extension) {
        PathBuf::from(destination)
    } else {
        let stamp = chrono::Local::now().format("%m-%d-%H-%M-%S");
        PathBuf::from(format!("{}.{}{}", destination, stamp, extension))
    }
}

/// Prints job summaries and feeds the configured sinks. `rotate` picks the
/// next free `base-N.json` name instead of overwriting the base path.
pub(super) async fn emit_results(
    settings: &RunSettings,
    execution: &ExecutionResult,
    rotate: bool,
) -> AppResult<()> {
    for (name, job) in &execution.job_results.jobs {
        if !job.results.is_empty() {
            println!("{}", render_job_summary(name, &job.metadata, &job.results));
        }
    }

    let mut document = execution.clone();
    strip_document(
        &mut document.job_results,
        settings.no_measurements,
        settings.no_metadata,
    );

    if let Some(path) = settings.output.as_ref() {
        let written = sinks::json::write_result_file(path, rotate, &document).await?;
        info!("Results written to {:?}", written);
    }

    if let Some(sql) = settings.sql.as_ref() {
        let row = BenchmarkRow::build(
            &settings.session,
            settings.scenario.as_deref(),
            settings.description.as_deref(),
            &settings.run_id,
            &document.job_results,
        )?;
        sinks::db::write_row(sql, row).await?;
    }
    Ok(())
}
