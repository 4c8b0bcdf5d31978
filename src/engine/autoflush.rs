use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::agent::JobConnection;
use crate::config::types::Configuration;
use crate::error::{AppError, AppResult, EngineError};

use super::results::{ExecutionResult, window_results};
use super::{RunSettings, fleet, output};

/// Poll cadence while streaming.
const STREAM_INTERVAL: Duration = Duration::from_secs(5);

/// Mode B: stream one job on one endpoint, cutting an independent result
/// document at every delimiter. Stops on terminal job state or once the span
/// budget is exhausted.
pub async fn run_auto_flush(
    client: &reqwest::Client,
    configuration: &Configuration,
    settings: &RunSettings,
) -> AppResult<ExecutionResult> {
    let count = configuration.dependencies.len();
    if count != 1 {
        return Err(AppError::engine(EngineError::AutoFlushSingleJob { count }));
    }
    let Some(name) = configuration.dependencies.first() else {
        return Err(AppError::engine(EngineError::AutoFlushSingleJob { count }));
    };
    let Some(entry) = configuration.job(name) else {
        return Err(AppError::engine(EngineError::AutoFlushSingleJob { count }));
    };
    if entry.job.endpoints.len() != 1 {
        return Err(AppError::engine(EngineError::AutoFlushSingleEndpoint {
            count: entry.job.endpoints.len(),
        }));
    }
    if !entry.job.wait_for_exit && settings.span.is_none() {
        return Err(AppError::engine(EngineError::AutoFlushNeedsExitOrSpan));
    }

    let Some(endpoint) = entry.job.endpoints.first() else {
        return Err(AppError::engine(EngineError::AutoFlushSingleEndpoint {
            count: 0,
        }));
    };
    let mut connection =
        JobConnection::new(client.clone(), name, entry.template.clone(), endpoint);

    if !fleet::satisfies_requirements(std::slice::from_mut(&mut connection), &entry.job).await? {
        info!(
            "Job '{}' does not match the agent's OS/arch; skipping scenario",
            name
        );
        return Ok(ExecutionResult::default());
    }

    if let Err(err) = connection.start().await {
        error!("{}", err);
        return Ok(ExecutionResult {
            return_code: 1,
            ..Default::default()
        });
    }

    let started = Instant::now();
    let mut execution = ExecutionResult::default();
    let mut windows = 0u32;

    loop {
        tokio::time::sleep(STREAM_INTERVAL).await;

        if let Err(err) = connection.try_update().await {
            warn!("Poll failed: {}", err);
        }

        let mut stop = false;
        if connection.last_state().is_terminal() {
            stop = true;
        }
        if let Some(span) = settings.span
            && started.elapsed() >= span
        {
            stop = true;
        }

        if let Some(batch) = connection.drain_to_delimiter() {
            if let Err(err) = connection.flush_measurements().await {
                warn!("Flush failed: {}", err);
            }
            execution.job_results =
                window_results(entry, name, &connection, batch, &settings.properties);
            windows = windows.saturating_add(1);
            output::emit_results(settings, &execution, true).await?;
        }

        if stop {
            break;
        }
    }

    if let Err(err) = connection.stop().await {
        warn!("Failed to stop job: {}", err);
    }
    if let Err(err) = connection.try_update().await {
        warn!("Final update failed: {}", err);
    }
    if let Err(err) = connection.download_assets().await {
        warn!("Failed to download assets: {}", err);
    }
    if let Err(err) = connection.delete().await {
        warn!("Failed to delete job: {}", err);
    }

    // Anything left after the last delimiter forms a final window; a run
    // that never produced a delimiter still yields one document.
    let leftover = connection.measurements();
    if !leftover.is_empty() || windows == 0 {
        execution.job_results =
            window_results(entry, name, &connection, leftover, &settings.properties);
        output::emit_results(settings, &execution, true).await?;
    }

    execution.return_code = i32::from(connection.observed_failed());
    Ok(execution)
}
