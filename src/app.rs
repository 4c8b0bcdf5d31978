//! Run orchestration: turn parsed arguments into an assembled configuration,
//! run preflight, execute the selected mode, and hand results to the sinks.
use std::collections::BTreeMap;

use serde_json::Map;
use tracing::info;

use crate::agent;
use crate::args::ControllerArgs;
use crate::args::parsers::{fresh_session_id, resolve_env_indirection, variable_value};
use crate::compare;
use crate::config::{self, AssemblyRequest};
use crate::engine::{self, RunSettings};
use crate::error::{AppError, AppResult, ConfigError};
use crate::sinks::db::SqlSettings;

pub async fn execute(args: ControllerArgs, overrides: Vec<(String, String)>) -> AppResult<i32> {
    let session = args.session.clone().unwrap_or_else(fresh_session_id);
    let run_id = fresh_session_id();
    info!("Session {} (run {})", session, run_id);

    let mut variables = Map::new();
    for entry in &args.variables {
        let (key, value) = entry.split_once('=').ok_or_else(|| {
            AppError::config(ConfigError::VariablePairInvalid {
                entry: entry.clone(),
            })
        })?;
        variables.insert(key.to_owned(), variable_value(value));
    }

    let mut properties = BTreeMap::new();
    for entry in &args.properties {
        let (key, value) = entry.split_once('=').ok_or_else(|| {
            AppError::config(ConfigError::PropertyPairInvalid {
                entry: entry.clone(),
            })
        })?;
        properties.insert(key.to_owned(), value.to_owned());
    }

    let client = agent::build_client()?;

    let request = AssemblyRequest {
        sources: &args.config,
        scenario: args.scenario.as_deref(),
        custom_jobs: &args.jobs,
        profiles: &args.profiles,
        overrides: &overrides,
        variables: &variables,
        run_id: &run_id,
    };
    let configuration = config::assemble(&client, &request).await?;

    let settings = RunSettings {
        iterations: args.iterations,
        span: args.span.filter(|span| !span.is_zero()),
        repeat: args.repeat.clone(),
        output: args.output.clone(),
        properties,
        session,
        description: args.description.clone(),
        scenario: args.scenario.clone(),
        run_id,
        no_measurements: args.no_measurements,
        no_metadata: args.no_metadata,
        sql: args.sql.as_deref().map(|connection| SqlSettings {
            connection: resolve_env_indirection(connection),
            table: resolve_env_indirection(&args.table),
        }),
    };

    engine::preflight(&client, &configuration).await?;

    let execution = if args.auto_flush {
        engine::run_auto_flush(&client, &configuration, &settings).await?
    } else {
        engine::run_iterative(&client, &configuration, &settings).await?
    };

    if !args.compare.is_empty() {
        let mut baselines = Vec::with_capacity(args.compare.len());
        for path in &args.compare {
            baselines.push((path.clone(), compare::load_result_file(path)?));
        }
        compare::print_comparison(&execution, &baselines);
    }

    Ok(execution.return_code)
}
