use thiserror::Error;

use super::{AgentError, ConfigError, EngineError, SinkError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Execution error: {0}")]
    Engine(#[from] EngineError),
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn config<E>(error: E) -> Self
    where
        E: Into<ConfigError>,
    {
        error.into().into()
    }

    pub fn engine<E>(error: E) -> Self
    where
        E: Into<EngineError>,
    {
        error.into().into()
    }

    pub fn agent<E>(error: E) -> Self
    where
        E: Into<AgentError>,
    {
        error.into().into()
    }

    pub fn sink<E>(error: E) -> Self
    where
        E: Into<SinkError>,
    {
        error.into().into()
    }

    /// True for errors that terminate the process before any job is started
    /// (exit code -1).
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            AppError::Config(_)
                | AppError::Engine(
                    EngineError::EndpointUnreachable { .. }
                        | EngineError::MissingSource { .. }
                        | EngineError::MissingEndpoints { .. }
                        | EngineError::AutoFlushSingleJob { .. }
                        | EngineError::AutoFlushSingleEndpoint { .. }
                        | EngineError::AutoFlushNeedsExitOrSpan
                )
        )
    }
}
