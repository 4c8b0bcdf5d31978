use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, AppResult, ConfigError};

use super::patch::{ci_find, ci_get_mut, patch_object};
use super::schema::validate_document;

/// Upper bound on recursive import expansion.
const IMPORT_LIMIT: usize = 16;

/// Loads one configuration document: fetch, parse, schema-validate (YAML),
/// resolve local folders, and expand imports.
pub async fn load_document(client: &reqwest::Client, source: &str) -> AppResult<Value> {
    load_boxed(client, source.to_owned(), 0).await
}

fn load_boxed(
    client: &reqwest::Client,
    source: String,
    depth: usize,
) -> Pin<Box<dyn Future<Output = AppResult<Value>> + Send + '_>> {
    Box::pin(load_inner(client, source, depth))
}

async fn load_inner(client: &reqwest::Client, source: String, depth: usize) -> AppResult<Value> {
    if depth >= IMPORT_LIMIT {
        return Err(AppError::config(ConfigError::ImportDepth {
            path: source,
            limit: IMPORT_LIMIT,
        }));
    }

    let is_url = source.starts_with("http");
    let content = if is_url {
        fetch_url(client, &source).await?
    } else {
        std::fs::read_to_string(&source).map_err(|err| {
            AppError::config(ConfigError::NotFound {
                path: source.clone(),
                source: err,
            })
        })?
    };

    let mut document = parse_document(&source, &content)?;

    if !is_url {
        let config_dir = Path::new(&source)
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| std::path::PathBuf::from("."));
        resolve_local_folders(&mut document, &config_dir);
    }

    expand_imports(client, &source, is_url, &mut document, depth).await?;

    Ok(document)
}

async fn fetch_url(client: &reqwest::Client, url: &str) -> AppResult<String> {
    let response = client.get(url).send().await.map_err(|err| {
        AppError::config(ConfigError::Fetch {
            url: url.to_owned(),
            source: err,
        })
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::config(ConfigError::FetchStatus {
            url: url.to_owned(),
            status: status.as_u16(),
        }));
    }
    response.text().await.map_err(|err| {
        AppError::config(ConfigError::Fetch {
            url: url.to_owned(),
            source: err,
        })
    })
}

fn parse_document(source: &str, content: &str) -> AppResult<Value> {
    // Query strings on URL sources do not take part in format detection.
    let without_query = source.split('?').next().unwrap_or(source);
    match Path::new(without_query).extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(content).map_err(|err| {
            AppError::config(ConfigError::ParseJson {
                path: source.to_owned(),
                source: err,
            })
        }),
        Some("yml" | "yaml") => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(content).map_err(|err| {
                AppError::config(ConfigError::ParseYaml {
                    path: source.to_owned(),
                    source: err,
                })
            })?;
            let document = serde_json::to_value(yaml)?;
            validate_document(source, &document).map_err(AppError::config)?;
            Ok(document)
        }
        Some(ext) => Err(AppError::config(ConfigError::UnsupportedExtension {
            ext: ext.to_owned(),
        })),
        None => Err(AppError::config(ConfigError::MissingExtension {
            path: source.to_owned(),
        })),
    }
}

/// Rewrites relative `source.localFolder` paths of local documents to
/// absolute paths anchored at the document's directory.
fn resolve_local_folders(document: &mut Value, config_dir: &Path) {
    let Some(root) = document.as_object_mut() else {
        return;
    };
    let Some(jobs) = ci_get_mut(root, "jobs").and_then(Value::as_object_mut) else {
        return;
    };
    for job in jobs.values_mut() {
        let Some(job_map) = job.as_object_mut() else {
            continue;
        };
        let Some(source) = ci_get_mut(job_map, "source").and_then(Value::as_object_mut) else {
            continue;
        };
        let Some(folder) = ci_get_mut(source, "localFolder") else {
            continue;
        };
        let Some(path) = folder.as_str() else {
            continue;
        };
        if path.starts_with("http") || Path::new(path).is_absolute() {
            continue;
        }
        let resolved = config_dir.join(path);
        *folder = Value::String(resolved.to_string_lossy().into_owned());
    }
}

async fn expand_imports(
    client: &reqwest::Client,
    source: &str,
    is_url: bool,
    document: &mut Value,
    depth: usize,
) -> AppResult<()> {
    let Some(root) = document.as_object_mut() else {
        return Ok(());
    };
    let Some(imports_key) = ci_find(root, "imports").map(str::to_owned) else {
        return Ok(());
    };
    let Some(imports) = root.shift_remove(&imports_key) else {
        return Ok(());
    };
    let Some(entries) = imports.as_array() else {
        return Ok(());
    };

    let mut merged = Value::Object(serde_json::Map::new());
    for entry in entries {
        let Some(import) = entry.as_str() else {
            continue;
        };
        let resolved = resolve_import(source, is_url, import);
        debug!("Importing config '{}'", resolved);
        let imported = load_boxed(client, resolved, depth.saturating_add(1)).await?;
        patch_object(&mut merged, &imported);
    }

    // Imports merge before the importing document.
    patch_object(&mut merged, document);
    *document = merged;
    Ok(())
}

fn resolve_import(source: &str, source_is_url: bool, import: &str) -> String {
    if import.starts_with("http") || source_is_url || Path::new(import).is_absolute() {
        return import.to_owned();
    }
    Path::new(source)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(
            || import.to_owned(),
            |parent| parent.join(import).to_string_lossy().into_owned(),
        )
}
