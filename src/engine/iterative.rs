use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::agent::JobConnection;
use crate::agent::protocol::JobState;
use crate::config::types::Configuration;
use crate::error::AppResult;

use super::results::{ExecutionResult, build_job_results};
use super::{RunSettings, fleet, is_span_over, output, span_should_keep_running};

/// Poll cadence for `waitForExit` jobs.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Mode A: run the dependency list for `iterations` per pass, repeating
/// passes until the span budget is spent. Jobs before the repeat anchor stay
/// up across passes.
pub async fn run_iterative(
    client: &reqwest::Client,
    configuration: &Configuration,
    settings: &RunSettings,
) -> AppResult<ExecutionResult> {
    let started = Instant::now();
    let mut running: BTreeMap<String, Vec<JobConnection>> = BTreeMap::new();
    let mut failed: BTreeSet<String> = BTreeSet::new();
    let mut execution = ExecutionResult::default();
    let mut pass = 0u32;

    loop {
        pass = pass.saturating_add(1);
        for iteration in 1..=settings.iterations.max(1) {
            debug!("Pass {} iteration {}", pass, iteration);
            match run_dependencies(
                client,
                configuration,
                settings,
                started,
                &mut running,
                &mut failed,
            )
            .await?
            {
                IterationOutcome::Skipped => return Ok(ExecutionResult::default()),
                IterationOutcome::Aborted => {
                    shutdown_reverse(configuration, &mut running).await;
                    running.clear();
                    continue;
                }
                IterationOutcome::Completed => {}
            }

            collect_traces(configuration, settings, started, &mut running).await;

            // Non-blocking jobs stop in reverse dependency order.
            for name in configuration.dependencies.iter().rev() {
                let Some(entry) = configuration.job(name) else {
                    continue;
                };
                if entry.job.wait_for_exit {
                    continue;
                }
                if span_should_keep_running(name, &configuration.dependencies, settings, started) {
                    continue;
                }
                if let Some(connections) = running.get_mut(name) {
                    fleet::shutdown_all(connections).await;
                }
            }

            // The shutdown's final snapshots are the first look at the state
            // of non-blocking jobs.
            record_failures(&running, &mut failed);

            execution.job_results =
                build_job_results(configuration, &running, &settings.properties);
        }

        output::emit_results(settings, &execution, settings.span.is_some()).await?;

        if is_span_over(started, settings.span) {
            break;
        }
    }

    // Span-kept jobs are still up after the last pass.
    shutdown_reverse(configuration, &mut running).await;
    record_failures(&running, &mut failed);

    execution.return_code = failed.len() as i32;
    Ok(execution)
}

enum IterationOutcome {
    Completed,
    Aborted,
    Skipped,
}

async fn run_dependencies(
    client: &reqwest::Client,
    configuration: &Configuration,
    settings: &RunSettings,
    started: Instant,
    running: &mut BTreeMap<String, Vec<JobConnection>>,
    failed: &mut BTreeSet<String>,
) -> AppResult<IterationOutcome> {
    for name in &configuration.dependencies {
        let Some(entry) = configuration.job(name) else {
            continue;
        };

        let reuse = running.contains_key(name)
            && span_should_keep_running(name, &configuration.dependencies, settings, started);
        if reuse {
            if !entry.job.wait_for_exit
                && let Some(connections) = running.get_mut(name)
            {
                fleet::clear_all(connections).await;
            }
        } else {
            let mut connections: Vec<JobConnection> = entry
                .job
                .endpoints
                .iter()
                .map(|endpoint| {
                    JobConnection::new(client.clone(), name, entry.template.clone(), endpoint)
                })
                .collect();

            if !fleet::satisfies_requirements(&mut connections, &entry.job).await? {
                info!(
                    "Job '{}' does not match the agents' OS/arch; skipping scenario",
                    name
                );
                return Ok(IterationOutcome::Skipped);
            }

            let mut start_failed = false;
            for result in fleet::start_all(&mut connections).await {
                if let Err(err) = result {
                    error!("{}", err);
                    start_failed = true;
                }
            }
            if start_failed {
                failed.insert(name.clone());
                fleet::shutdown_all(&mut connections).await;
                return Ok(IterationOutcome::Aborted);
            }

            let mut job_failed = false;
            if entry.job.wait_for_exit {
                fleet::poll_until_terminal(&mut connections, POLL_INTERVAL).await;
                // Capture the terminal state before teardown rewrites it.
                job_failed = connections
                    .iter()
                    .any(|connection| connection.last_state() == JobState::Failed);
                fleet::shutdown_all(&mut connections).await;
            }

            running.insert(name.clone(), connections);
            if job_failed {
                error!("Job '{}' reported a failure", name);
                failed.insert(name.clone());
                return Ok(IterationOutcome::Aborted);
            }
        }

        if let Some(connections) = running.get(name)
            && connections.iter().any(|connection| {
                connection.observed_failed() || connection.last_state() == JobState::Failed
            })
        {
            error!("Job '{}' reported a failure", name);
            failed.insert(name.clone());
            return Ok(IterationOutcome::Aborted);
        }
    }
    Ok(IterationOutcome::Completed)
}

/// Traces download after every job has produced data but before non-blocking
/// jobs are stopped. A failed download never aborts the run.
async fn collect_traces(
    configuration: &Configuration,
    settings: &RunSettings,
    started: Instant,
    running: &mut BTreeMap<String, Vec<JobConnection>>,
) {
    for name in &configuration.dependencies {
        let Some(entry) = configuration.job(name) else {
            continue;
        };
        if !entry.job.wants_trace() {
            continue;
        }
        if span_should_keep_running(name, &configuration.dependencies, settings, started) {
            continue;
        }
        let Some(connections) = running.get_mut(name) else {
            continue;
        };
        for connection in connections.iter_mut() {
            let os = connection
                .cached_info()
                .map(|info| info.os.clone())
                .unwrap_or_default();
            let destination = output::trace_destination(
                name,
                entry.job.options.trace_output.as_deref(),
                entry.job.collect,
                &os,
            );
            if let Err(err) = connection.download_trace(&destination).await {
                warn!("Trace download for '{}' failed: {}", name, err);
            }
        }
    }
}

/// Folds failures observed by any connection into the failed set that
/// drives the return code. Observations are sticky, so jobs already torn
/// down still count.
pub(super) fn record_failures(
    running: &BTreeMap<String, Vec<JobConnection>>,
    failed: &mut BTreeSet<String>,
) {
    for (name, connections) in running {
        if connections.iter().any(JobConnection::observed_failed) && failed.insert(name.clone()) {
            error!("Job '{}' reported a failure", name);
        }
    }
}

/// Stops whatever is still running, in reverse dependency order.
async fn shutdown_reverse(
    configuration: &Configuration,
    running: &mut BTreeMap<String, Vec<JobConnection>>,
) {
    for name in configuration.dependencies.iter().rev() {
        if let Some(connections) = running.get_mut(name)
            && connections
                .iter()
                .any(|connection| connection.last_state() != JobState::Deleted)
        {
            fleet::shutdown_all(connections).await;
        }
    }
}
