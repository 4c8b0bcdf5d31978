use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Endpoint '{endpoint}' of job '{job}' is unreachable: {source}")]
    EndpointUnreachable {
        job: String,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Job '{job}' defines no source (project, executable, dockerFile, or dockerLoad).")]
    MissingSource { job: String },
    #[error("Job '{job}' defines no endpoints.")]
    MissingEndpoints { job: String },
    #[error("Failed to start job '{job}' on '{endpoint}': {message}")]
    StartFailed {
        job: String,
        endpoint: String,
        message: String,
    },
    #[error("--auto-flush requires exactly one job, got {count}.")]
    AutoFlushSingleJob { count: usize },
    #[error("--auto-flush requires the job to have exactly one endpoint, got {count}.")]
    AutoFlushSingleEndpoint { count: usize },
    #[error("--auto-flush requires waitForExit or a --span budget.")]
    AutoFlushNeedsExitOrSpan,
}
