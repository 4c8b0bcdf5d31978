use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::JobConnection;
use crate::agent::protocol::{AgentInfo, Measurement, MeasurementMetadata};
use crate::config::types::{Configuration, JobEntry};
use crate::measurements::{aggregate_agent, normalize, reduce_agents};

/// Aggregated outcome for one job: cross-agent summary values, the metadata
/// they were computed from, raw per-agent measurement streams, and the
/// environment facts of the agents involved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobResult {
    pub results: Map<String, Value>,
    pub metadata: Vec<MeasurementMetadata>,
    pub measurements: Vec<Vec<Measurement>>,
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobResults {
    pub jobs: BTreeMap<String, JobResult>,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionResult {
    pub job_results: JobResults,
    pub return_code: i32,
}

/// Aggregates every running dependency, in dependency order.
pub fn build_job_results(
    configuration: &Configuration,
    running: &BTreeMap<String, Vec<JobConnection>>,
    properties: &BTreeMap<String, String>,
) -> JobResults {
    let mut job_results = JobResults {
        properties: properties.clone(),
        ..Default::default()
    };
    for name in &configuration.dependencies {
        let Some(entry) = configuration.job(name) else {
            continue;
        };
        let Some(connections) = running.get(name) else {
            continue;
        };
        let streams: Vec<Vec<Measurement>> = connections
            .iter()
            .map(JobConnection::measurements)
            .collect();
        job_results
            .jobs
            .insert(name.clone(), collect_job_result(entry, connections, streams));
    }
    job_results
}

/// Builds a result document for one auto-flush window.
pub fn window_results(
    entry: &JobEntry,
    name: &str,
    connection: &JobConnection,
    batch: Vec<Measurement>,
    properties: &BTreeMap<String, String>,
) -> JobResults {
    let mut job_results = JobResults {
        properties: properties.clone(),
        ..Default::default()
    };
    job_results.jobs.insert(
        name.to_owned(),
        collect_job_result(entry, std::slice::from_ref(connection), vec![batch]),
    );
    job_results
}

fn collect_job_result(
    entry: &JobEntry,
    connections: &[JobConnection],
    mut streams: Vec<Vec<Measurement>>,
) -> JobResult {
    let mut metadata: Vec<MeasurementMetadata> = Vec::new();
    for connection in connections {
        for candidate in connection.metadata() {
            if !metadata.iter().any(|known| known.name == candidate.name) {
                metadata.push(candidate.clone());
            }
        }
    }

    normalize(&mut metadata, &mut streams);

    let summaries: Vec<Map<String, Value>> = streams
        .iter()
        .map(|stream| aggregate_agent(&metadata, stream))
        .collect();
    let results = reduce_agents(&metadata, &summaries);

    let environment = connections
        .first()
        .and_then(JobConnection::cached_info)
        .map(AgentInfo::environment)
        .unwrap_or_default();

    if entry.job.options.discard_results {
        return JobResult {
            metadata,
            environment,
            ..Default::default()
        };
    }

    JobResult {
        results,
        metadata,
        measurements: streams,
        environment,
    }
}

/// Applies the `--no-measurements` / `--no-metadata` output options.
pub fn strip_document(job_results: &mut JobResults, no_measurements: bool, no_metadata: bool) {
    for job in job_results.jobs.values_mut() {
        if no_measurements {
            job.measurements.clear();
        }
        if no_metadata {
            job.metadata.clear();
        }
    }
}
