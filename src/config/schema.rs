use std::path::PathBuf;

use serde_json::Value;
use tracing::warn;

use crate::error::ConfigError;

/// Schema shipped alongside the binary; YAML documents are validated against
/// it after conversion to the generic tree.
const BENCHMARKS_SCHEMA: &str = include_str!("benchmarks.schema.json");

pub(super) fn validate_document(path: &str, document: &Value) -> Result<(), ConfigError> {
    let schema: Value =
        serde_json::from_str(BENCHMARKS_SCHEMA).map_err(|err| ConfigError::SchemaCompile {
            message: err.to_string(),
        })?;
    let validator =
        jsonschema::validator_for(&schema).map_err(|err| ConfigError::SchemaCompile {
            message: err.to_string(),
        })?;

    if let Err(error) = validator.validate(document) {
        let instance_path = error.instance_path.to_string();
        let message = error.to_string();
        let dump = dump_offending_document(document);
        return Err(ConfigError::SchemaViolation {
            path: path.to_owned(),
            instance_path,
            message,
            dump,
        });
    }
    Ok(())
}

fn dump_offending_document(document: &Value) -> PathBuf {
    let dump = std::env::temp_dir().join(format!("benchctl-invalid-{}.json", std::process::id()));
    let rendered = serde_json::to_string_pretty(document).unwrap_or_default();
    if let Err(err) = std::fs::write(&dump, rendered) {
        warn!("Failed to dump invalid config to {:?}: {}", dump, err);
    }
    dump
}
