use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::measurements::Operation;

/// Lifecycle states a job moves through on an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    #[default]
    New,
    Initializing,
    Waiting,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
    Deleted,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Stopped | JobState::Failed | JobState::Deleted)
    }
}

/// One sample reported by an agent. A delimiter marks a flush boundary in
/// auto-flush streaming mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Measurement {
    pub name: String,
    pub timestamp: String,
    pub value: Value,
    pub is_delimiter: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeasurementMetadata {
    pub name: String,
    pub source: String,
    pub short_description: String,
    pub format: String,
    pub aggregate: Operation,
    pub reduce: Operation,
}

/// Full job snapshot pulled by `tryUpdate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobSnapshot {
    pub state: JobState,
    pub measurements: Vec<Measurement>,
    pub metadata: Vec<MeasurementMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartResponse {
    pub id: String,
}

/// Environment facts reported by an agent's `info` sub-resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentInfo {
    pub os: String,
    pub arch: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentInfo {
    /// Flattens the info into the string map stored on each job result.
    pub fn environment(&self) -> std::collections::BTreeMap<String, String> {
        let mut environment = std::collections::BTreeMap::new();
        environment.insert("os".to_owned(), self.os.clone());
        environment.insert("arch".to_owned(), self.arch.clone());
        for (key, value) in &self.extra {
            let rendered = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            environment.insert(key.clone(), rendered);
        }
        environment
    }
}
