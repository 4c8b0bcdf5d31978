use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{AppError, AppResult, ConfigError};

use super::loader::load_document;
use super::patch::{ci_find, ci_get, ci_get_mut, merge_variables, patch_object};
use super::template::render_template;
use super::types::{Configuration, Job, JobEntry};

/// Everything the assembler consumes, in the order the steps apply it.
pub struct AssemblyRequest<'a> {
    pub sources: &'a [String],
    pub scenario: Option<&'a str>,
    pub custom_jobs: &'a [String],
    pub profiles: &'a [String],
    pub overrides: &'a [(String, String)],
    pub variables: &'a Map<String, Value>,
    pub run_id: &'a str,
}

/// Builds the concrete [`Configuration`]: merge documents, instantiate the
/// scenario, force job invariants, apply profiles and dotted overrides, and
/// evaluate templates.
pub async fn assemble(
    client: &reqwest::Client,
    request: &AssemblyRequest<'_>,
) -> AppResult<Configuration> {
    let mut tree = Value::Object(Map::new());
    for source in request.sources {
        let document = load_document(client, source).await?;
        patch_object(&mut tree, &document);
    }

    let mut dependencies: Vec<String> = Vec::new();
    if let Some(scenario) = request.scenario {
        instantiate_scenario(&mut tree, scenario, &mut dependencies)?;
    }
    for name in request.custom_jobs {
        register_custom_job(&mut tree, name);
        dependencies.push(name.clone());
    }
    if dependencies.is_empty() {
        return Err(AppError::config(ConfigError::NoJobSelected));
    }

    force_invariants(&mut tree, request.run_id);

    for profile in request.profiles {
        apply_profile(&mut tree, profile)?;
    }

    for (path, value) in request.overrides {
        apply_override(&mut tree, path, value)?;
    }

    evaluate_templates(&mut tree, request.variables);

    let jobs = extract_jobs(&tree, &dependencies)?;
    debug!(
        "Assembled configuration with {} dependencies",
        dependencies.len()
    );
    Ok(Configuration {
        tree,
        dependencies,
        jobs,
    })
}

fn instantiate_scenario(
    tree: &mut Value,
    name: &str,
    dependencies: &mut Vec<String>,
) -> AppResult<()> {
    let scenario = tree
        .as_object()
        .and_then(|root| ci_get(root, "scenarios"))
        .and_then(Value::as_object)
        .and_then(|scenarios| ci_get(scenarios, name))
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| {
            AppError::config(ConfigError::MissingScenario {
                name: name.to_owned(),
            })
        })?;

    for (service_name, dependency) in &scenario {
        let job_ref = dependency
            .as_object()
            .and_then(|dep| ci_get(dep, "job"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::config(ConfigError::ServiceMissingJob {
                    scenario: name.to_owned(),
                    service: service_name.clone(),
                })
            })?
            .to_owned();

        let template = tree
            .as_object()
            .and_then(|root| ci_get(root, "jobs"))
            .and_then(Value::as_object)
            .and_then(|jobs| ci_get(jobs, &job_ref))
            .cloned()
            .ok_or_else(|| {
                AppError::config(ConfigError::MissingJob {
                    scenario: name.to_owned(),
                    service: service_name.clone(),
                    job: job_ref.clone(),
                })
            })?;

        let mut instance = template;
        patch_object(&mut instance, dependency);

        if let Some(jobs) = tree
            .as_object_mut()
            .and_then(|root| ci_get_mut(root, "jobs"))
            .and_then(Value::as_object_mut)
        {
            ci_set(jobs, service_name, instance);
        }
        dependencies.push(service_name.clone());
    }
    Ok(())
}

/// Registers an empty job template for an ad-hoc `--job` name that no loaded
/// document defines.
fn register_custom_job(tree: &mut Value, name: &str) {
    let Some(root) = tree.as_object_mut() else {
        return;
    };
    if ci_find(root, "jobs").is_none() {
        root.insert("jobs".to_owned(), Value::Object(Map::new()));
    }
    let Some(jobs) = ci_get_mut(root, "jobs").and_then(Value::as_object_mut) else {
        return;
    };
    if ci_find(jobs, name).is_none() {
        jobs.insert(name.to_owned(), Value::Object(Map::new()));
    }
}

fn force_invariants(tree: &mut Value, run_id: &str) {
    let Some(jobs) = tree
        .as_object_mut()
        .and_then(|root| ci_get_mut(root, "jobs"))
        .and_then(Value::as_object_mut)
    else {
        return;
    };
    let names: Vec<String> = jobs.keys().cloned().collect();
    for name in names {
        let Some(job) = jobs.get_mut(&name).and_then(Value::as_object_mut) else {
            continue;
        };
        ci_set(job, "selfContained", Value::Bool(true));
        ci_set(job, "service", Value::String(name.clone()));
        ci_set(job, "driverVersion", Value::from(2));
        ci_set(job, "runId", Value::String(run_id.to_owned()));
    }
}

fn apply_profile(tree: &mut Value, name: &str) -> AppResult<()> {
    let mut profile = tree
        .as_object()
        .and_then(|root| ci_get(root, "profiles"))
        .and_then(Value::as_object)
        .and_then(|profiles| ci_get(profiles, name))
        .cloned()
        .ok_or_else(|| {
            AppError::config(ConfigError::MissingProfile {
                name: name.to_owned(),
            })
        })?;

    // Profile variables land in each profile-scoped job first, so they shadow
    // root variables at the job level.
    if let Some(profile_map) = profile.as_object_mut() {
        let profile_vars = ci_get(profile_map, "variables").cloned();
        if let Some(vars) = profile_vars
            && vars.is_object()
            && let Some(jobs) = ci_get_mut(profile_map, "jobs").and_then(Value::as_object_mut)
        {
            for job in jobs.values_mut() {
                let Some(job_map) = job.as_object_mut() else {
                    continue;
                };
                if ci_find(job_map, "variables").is_none() {
                    job_map.insert("variables".to_owned(), Value::Object(Map::new()));
                }
                if let Some(slot) = ci_get_mut(job_map, "variables") {
                    patch_object(slot, &vars);
                }
            }
        }
    }

    patch_object(tree, &profile);
    Ok(())
}

/// Applies one dotted-path override; traversal starts at `jobs` and matches
/// keys case-insensitively.
fn apply_override(tree: &mut Value, path: &str, raw: &str) -> AppResult<()> {
    let missing = |segment: &str| {
        AppError::config(ConfigError::OverridePathMissing {
            path: path.to_owned(),
            segment: segment.to_owned(),
        })
    };

    let mut node = tree
        .as_object_mut()
        .and_then(|root| ci_get_mut(root, "jobs"))
        .ok_or_else(|| missing("jobs"))?;

    let segments: Vec<&str> = path.split('.').collect();
    let (last, init) = segments.split_last().ok_or_else(|| missing(path))?;
    for segment in init {
        let map = node.as_object_mut().ok_or_else(|| missing(segment))?;
        node = ci_get_mut(map, segment).ok_or_else(|| missing(segment))?;
    }
    let map = node.as_object_mut().ok_or_else(|| missing(last))?;
    let target = ci_get_mut(map, last).ok_or_else(|| missing(last))?;

    match target {
        Value::Array(items) => items.push(parse_override_value(raw)),
        Value::Object(object) => {
            let (key, value) = raw.split_once('=').ok_or_else(|| {
                AppError::config(ConfigError::OverrideNeedsPair {
                    path: path.to_owned(),
                    value: raw.to_owned(),
                })
            })?;
            ci_set(object, key, parse_override_value(value));
        }
        scalar => *scalar = coerce_scalar(scalar, raw, path)?,
    }
    Ok(())
}

fn coerce_scalar(target: &Value, raw: &str, path: &str) -> AppResult<Value> {
    let coerce_error = |kind: &'static str| {
        AppError::config(ConfigError::OverrideCoerce {
            path: path.to_owned(),
            value: raw.to_owned(),
            kind,
        })
    };
    match target {
        Value::Number(existing) => {
            if existing.is_f64() {
                raw.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| coerce_error("number"))
            } else {
                raw.parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| coerce_error("integer"))
            }
        }
        Value::Bool(_) => raw
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| coerce_error("boolean")),
        Value::String(_) => Ok(Value::String(raw.to_owned())),
        _ => Ok(parse_override_value(raw)),
    }
}

fn parse_override_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

/// Per-job template pass: merge the three variable scopes (root, job,
/// command line; low to high) and render every string leaf that contains a
/// brace.
fn evaluate_templates(tree: &mut Value, cli_variables: &Map<String, Value>) {
    let root_vars = tree
        .as_object()
        .and_then(|root| ci_get(root, "variables"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    let Some(jobs) = tree
        .as_object_mut()
        .and_then(|root| ci_get_mut(root, "jobs"))
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    let cli_overlay = Value::Object(cli_variables.clone());
    for job in jobs.values_mut() {
        let mut env = root_vars.clone();
        let job_vars = job
            .as_object()
            .and_then(|job_map| ci_get(job_map, "variables"))
            .cloned();
        if let Some(vars) = job_vars {
            merge_variables(&mut env, &vars);
        }
        merge_variables(&mut env, &cli_overlay);

        let Some(env_map) = env.as_object() else {
            continue;
        };
        render_strings(job, env_map);
    }
}

fn render_strings(node: &mut Value, env: &Map<String, Value>) {
    match node {
        Value::String(text) => {
            if text.contains('{') {
                *text = render_template(text, env);
            }
        }
        Value::Array(items) => {
            for item in items {
                render_strings(item, env);
            }
        }
        Value::Object(map) => {
            for value in map.values_mut() {
                render_strings(value, env);
            }
        }
        _ => {}
    }
}

fn extract_jobs(tree: &Value, dependencies: &[String]) -> AppResult<Vec<JobEntry>> {
    let jobs_map = tree
        .as_object()
        .and_then(|root| ci_get(root, "jobs"))
        .and_then(Value::as_object);

    let mut entries = Vec::with_capacity(dependencies.len());
    for name in dependencies {
        let template = jobs_map
            .and_then(|jobs| ci_get(jobs, name))
            .cloned()
            .filter(Value::is_object)
            .ok_or_else(|| {
                AppError::config(ConfigError::JobNotObject { job: name.clone() })
            })?;
        let job: Job = serde_json::from_value(template.clone()).map_err(|err| {
            AppError::config(ConfigError::JobShape {
                job: name.clone(),
                source: err,
            })
        })?;
        entries.push(JobEntry {
            name: name.clone(),
            job,
            template,
        });
    }
    Ok(entries)
}

fn ci_set(map: &mut Map<String, Value>, key: &str, value: Value) {
    match ci_find(map, key).map(str::to_owned) {
        Some(existing) => {
            map.insert(existing, value);
        }
        None => {
            map.insert(key.to_owned(), value);
        }
    }
}
