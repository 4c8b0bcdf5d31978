use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{AppError, AppResult, SinkError};

/// Writes the result document as indented camelCase JSON. With `rotate` the
/// next free `base-N.json` name is picked instead of overwriting `base`.
pub async fn write_result_file<T>(path: &Path, rotate: bool, document: &T) -> AppResult<PathBuf>
where
    T: Serialize,
{
    let target = if rotate {
        rotated_path(path)
    } else {
        path.to_path_buf()
    };
    let json = serde_json::to_vec_pretty(document).map_err(|err| {
        AppError::sink(SinkError::Serialize {
            context: "result document",
            source: err,
        })
    })?;
    tokio::fs::write(&target, json).await.map_err(|err| {
        AppError::sink(SinkError::WriteResult {
            path: target.clone(),
            source: err,
        })
    })?;
    Ok(target)
}

pub(crate) fn rotated_path(base: &Path) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_owned());
    let extension = base
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let mut index = 1usize;
    loop {
        let candidate = base.with_file_name(format!("{}-{}{}", stem, index, extension));
        if !candidate.exists() {
            return candidate;
        }
        index = index.saturating_add(1);
    }
}
