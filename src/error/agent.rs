use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Failed to build HTTP client: {source}")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    #[error("Agent call '{op}' against '{endpoint}' failed: {source}")]
    Request {
        op: &'static str,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Agent call '{op}' against '{endpoint}' returned HTTP {status}.")]
    Status {
        op: &'static str,
        endpoint: String,
        status: u16,
    },
    #[error("Agent call '{op}' requires a started job.")]
    NotStarted { op: &'static str },
    #[error("Failed to {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}
