use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write result file '{path}': {source}")]
    WriteResult {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize {context}: {source}")]
    Serialize {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to {context}: {source}")]
    Database {
        context: &'static str,
        #[source]
        source: tokio_rusqlite::Error,
    },
}
