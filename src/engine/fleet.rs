use std::time::Duration;

use futures_util::future::join_all;
use tracing::warn;

use crate::agent::JobConnection;
use crate::agent::protocol::JobState;
use crate::config::types::Job;
use crate::error::AppResult;

/// Fan-out start across a job's endpoints. Every endpoint completes its call
/// even when a peer fails; the caller inspects the collected results.
pub(super) async fn start_all(connections: &mut [JobConnection]) -> Vec<AppResult<()>> {
    join_all(connections.iter_mut().map(JobConnection::start)).await
}

pub(super) async fn clear_all(connections: &mut [JobConnection]) {
    for result in join_all(connections.iter_mut().map(JobConnection::clear_measurements)).await {
        if let Err(err) = result {
            warn!("Failed to clear measurements: {}", err);
        }
    }
}

pub(super) async fn update_all(connections: &mut [JobConnection]) {
    for result in join_all(connections.iter_mut().map(JobConnection::try_update)).await {
        if let Err(err) = result {
            warn!("Failed to update job: {}", err);
        }
    }
}

/// Stop, pull the final snapshot, download assets, and delete. Failures are
/// logged; teardown always proceeds. Deleted connections are left alone.
pub(super) async fn shutdown_all(connections: &mut [JobConnection]) {
    for result in join_all(
        connections
            .iter_mut()
            .filter(|connection| connection.last_state() != JobState::Deleted)
            .map(JobConnection::stop),
    )
    .await
    {
        if let Err(err) = result {
            warn!("Failed to stop job: {}", err);
        }
    }
    update_all(connections).await;
    for result in join_all(
        connections
            .iter_mut()
            .map(JobConnection::download_assets),
    )
    .await
    {
        if let Err(err) = result {
            warn!("Failed to download assets: {}", err);
        }
    }
    for result in join_all(
        connections
            .iter_mut()
            .filter(|connection| connection.last_state() != JobState::Deleted)
            .map(JobConnection::delete),
    )
    .await
    {
        if let Err(err) = result {
            warn!("Failed to delete job: {}", err);
        }
    }
}

/// Polls every connection until all of them report a terminal state.
pub(super) async fn poll_until_terminal(connections: &mut [JobConnection], interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        for connection in connections.iter_mut() {
            if let Err(err) = connection.state().await {
                warn!("State poll failed: {}", err);
            }
        }
        if connections
            .iter()
            .all(|connection| connection.last_state().is_terminal())
        {
            return;
        }
    }
}

/// Checks the job's OS/arch requirements against each agent. Fetching info
/// also primes the per-connection cache used for result environments.
pub(super) async fn satisfies_requirements(
    connections: &mut [JobConnection],
    job: &Job,
) -> AppResult<bool> {
    for connection in connections.iter_mut() {
        let info = connection.info().await?;
        if let Some(required) = job.options.required_operating_system.as_deref()
            && !required.eq_ignore_ascii_case(&info.os)
        {
            return Ok(false);
        }
        if let Some(required) = job.options.required_architecture.as_deref()
            && !required.eq_ignore_ascii_case(&info.arch)
        {
            return Ok(false);
        }
    }
    Ok(true)
}
