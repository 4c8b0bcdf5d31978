use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    NotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to fetch config '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Config '{url}' returned HTTP {status}.")]
    FetchStatus { url: String, status: u16 },
    #[error("Unsupported config extension '{ext}'. Use .json, .yml, or .yaml.")]
    UnsupportedExtension { ext: String },
    #[error("Config '{path}' must have a .json, .yml, or .yaml extension.")]
    MissingExtension { path: String },
    #[error("Failed to parse JSON config '{path}': {source}")]
    ParseJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to parse YAML config '{path}': {source}")]
    ParseYaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Config '{path}' failed schema validation at '{instance_path}': {message} (document dumped to {dump:?})")]
    SchemaViolation {
        path: String,
        instance_path: String,
        message: String,
        dump: PathBuf,
    },
    #[error("Embedded benchmarks schema is invalid: {message}")]
    SchemaCompile { message: String },
    #[error("Import chain exceeds {limit} documents at '{path}'.")]
    ImportDepth { path: String, limit: usize },
    #[error("Scenario '{name}' is not defined.")]
    MissingScenario { name: String },
    #[error("Scenario '{scenario}' service '{service}' does not name a job.")]
    ServiceMissingJob { scenario: String, service: String },
    #[error("Scenario '{scenario}' service '{service}' references undefined job '{job}'.")]
    MissingJob {
        scenario: String,
        service: String,
        job: String,
    },
    #[error("Profile '{name}' is not defined.")]
    MissingProfile { name: String },
    #[error("No job selected. Provide --scenario or at least one --job.")]
    NoJobSelected,
    #[error("Override '{path}' does not resolve: no segment '{segment}'.")]
    OverridePathMissing { path: String, segment: String },
    #[error("Override '{path}' targets an object and needs a 'key=value' argument, got '{value}'.")]
    OverrideNeedsPair { path: String, value: String },
    #[error("Override '{path}': cannot coerce '{value}' to the existing {kind} value.")]
    OverrideCoerce {
        path: String,
        value: String,
        kind: &'static str,
    },
    #[error("Variable '{entry}' must use the key=value form.")]
    VariablePairInvalid { entry: String },
    #[error("Property '{entry}' must use the key=value form.")]
    PropertyPairInvalid { entry: String },
    #[error("Job '{job}' is not an object after assembly.")]
    JobNotObject { job: String },
    #[error("Job '{job}' does not deserialize: {source}")]
    JobShape {
        job: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to read compare file '{path}': {source}")]
    CompareRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse compare file '{path}': {source}")]
    CompareParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
