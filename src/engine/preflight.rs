use std::time::Duration;

use tracing::info;

use crate::config::types::Configuration;
use crate::error::{AppError, AppResult, EngineError};

/// Hard per-endpoint deadline for the reachability probe.
const ENDPOINT_TIMEOUT: Duration = Duration::from_secs(10);

/// Validates every dependency before any job is started: a source
/// descriptor, a non-empty endpoint list, and reachable endpoints. Any
/// violation is fatal.
pub async fn preflight(client: &reqwest::Client, configuration: &Configuration) -> AppResult<()> {
    for entry in &configuration.jobs {
        if !entry.job.has_source() {
            return Err(AppError::engine(EngineError::MissingSource {
                job: entry.name.clone(),
            }));
        }
        if entry.job.endpoints.is_empty() {
            return Err(AppError::engine(EngineError::MissingEndpoints {
                job: entry.name.clone(),
            }));
        }
    }

    for entry in &configuration.jobs {
        for endpoint in &entry.job.endpoints {
            client
                .get(endpoint)
                .timeout(ENDPOINT_TIMEOUT)
                .send()
                .await
                .map_err(|err| {
                    AppError::engine(EngineError::EndpointUnreachable {
                        job: entry.name.clone(),
                        endpoint: endpoint.clone(),
                        source: err,
                    })
                })?;
            info!("Endpoint {} is reachable", endpoint);
        }
    }
    Ok(())
}
