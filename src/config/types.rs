use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Typed view of one assembled job. The raw rendered subtree is kept next to
/// it in [`JobEntry`] because the agent receives the full template, arbitrary
/// override properties included.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Job {
    pub source: SourceSection,
    pub executable: Option<String>,
    pub endpoints: Vec<String>,
    pub wait_for_exit: bool,
    pub options: JobOptions,
    pub dot_net_trace: bool,
    pub collect: bool,
    pub variables: Map<String, Value>,
    pub self_contained: bool,
    pub service: String,
    pub driver_version: u32,
    pub run_id: String,
}

impl Job {
    pub fn has_source(&self) -> bool {
        self.executable.is_some()
            || self.source.project.is_some()
            || self.source.docker_file.is_some()
            || self.source.docker_load.is_some()
    }

    pub fn wants_trace(&self) -> bool {
        self.dot_net_trace || self.collect
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceSection {
    pub project: Option<String>,
    pub docker_file: Option<String>,
    pub docker_load: Option<String>,
    pub local_folder: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobOptions {
    pub required_operating_system: Option<String>,
    pub required_architecture: Option<String>,
    pub trace_output: Option<String>,
    pub discard_results: bool,
}

/// The fully assembled configuration. Pure data once built; nothing mutates
/// it after template evaluation.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub tree: Value,
    pub dependencies: Vec<String>,
    pub jobs: Vec<JobEntry>,
}

#[derive(Debug, Clone)]
pub struct JobEntry {
    pub name: String,
    pub job: Job,
    pub template: Value,
}

impl Configuration {
    pub fn job(&self, name: &str) -> Option<&JobEntry> {
        self.jobs
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}
