mod support_agent;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::tempdir;

use benchctl::config::types::Configuration;
use benchctl::config::{AssemblyRequest, assemble};
use benchctl::engine::{RunSettings, preflight, run_auto_flush, run_iterative};

use support_agent::{default_measurements, default_metadata, spawn_agent};

fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

async fn assemble_from(
    client: &reqwest::Client,
    dir: &Path,
    config: &Value,
    scenario: &str,
) -> Result<Configuration, String> {
    let path = dir.join("bench.json");
    std::fs::write(&path, config.to_string()).map_err(|err| format!("write failed: {}", err))?;
    let sources = vec![path.to_string_lossy().into_owned()];
    let request = AssemblyRequest {
        sources: &sources,
        scenario: Some(scenario),
        custom_jobs: &[],
        profiles: &[],
        overrides: &[],
        variables: &serde_json::Map::new(),
        run_id: "run-e2e",
    };
    assemble(client, &request)
        .await
        .map_err(|err| format!("assemble failed: {}", err))
}

fn base_settings(output: &Path) -> RunSettings {
    RunSettings {
        iterations: 1,
        output: Some(output.to_path_buf()),
        session: "session-e2e".to_owned(),
        run_id: "run-e2e".to_owned(),
        ..Default::default()
    }
}

fn event_position(events: &[String], needle: &str) -> Result<usize, String> {
    events
        .iter()
        .position(|event| event == needle)
        .ok_or_else(|| format!("Missing event '{}' in {:?}", needle, events))
}

#[test]
fn single_job_wait_for_exit_runs_the_full_lifecycle() -> Result<(), String> {
    run_async_test(async {
        let (url, agent) = spawn_agent(default_measurements(), default_metadata())?;
        let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let config = json!({
            "jobs": {
                "server": { "executable": "echo", "endpoints": [url], "waitForExit": true }
            },
            "scenarios": { "s": { "srv": { "job": "server" } } }
        });

        let client =
            benchctl::agent::build_client().map_err(|err| format!("client failed: {}", err))?;
        let configuration = assemble_from(&client, dir.path(), &config, "s").await?;
        preflight(&client, &configuration)
            .await
            .map_err(|err| format!("preflight failed: {}", err))?;

        let output = dir.path().join("out.json");
        let settings = base_settings(&output);
        let execution = run_iterative(&client, &configuration, &settings)
            .await
            .map_err(|err| format!("run failed: {}", err))?;

        if execution.return_code != 0 {
            return Err(format!("Unexpected return code: {}", execution.return_code));
        }
        let job = execution
            .job_results
            .jobs
            .get("srv")
            .ok_or_else(|| "Job srv missing from results".to_owned())?;
        if job.results.get("rps") != Some(&json!(30)) {
            return Err(format!("Unexpected summary: {:?}", job.results.get("rps")));
        }

        let raw =
            std::fs::read_to_string(&output).map_err(|err| format!("read failed: {}", err))?;
        let document: Value =
            serde_json::from_str(&raw).map_err(|err| format!("parse failed: {}", err))?;
        if document.pointer("/jobResults/jobs/srv/results/rps") != Some(&json!(30)) {
            return Err("Result document does not carry the summary".to_owned());
        }

        let events = agent.state.events();
        for needle in ["start srv", "stop srv", "delete srv"] {
            if !events.iter().any(|event| event == needle) {
                return Err(format!("Missing event '{}' in {:?}", needle, events));
            }
        }
        Ok(())
    })
}

#[test]
fn two_job_pipeline_starts_in_order_and_stops_in_reverse() -> Result<(), String> {
    run_async_test(async {
        let (url, agent) = spawn_agent(default_measurements(), default_metadata())?;
        let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let config = json!({
            "jobs": {
                "srv": { "executable": "server-bin", "endpoints": [url], "waitForExit": false },
                "clt": { "executable": "client-bin", "endpoints": [url], "waitForExit": true }
            },
            "scenarios": {
                "s": {
                    "server": { "job": "srv" },
                    "client": { "job": "clt" }
                }
            }
        });

        let client =
            benchctl::agent::build_client().map_err(|err| format!("client failed: {}", err))?;
        let configuration = assemble_from(&client, dir.path(), &config, "s").await?;
        preflight(&client, &configuration)
            .await
            .map_err(|err| format!("preflight failed: {}", err))?;

        let output = dir.path().join("out.json");
        let settings = base_settings(&output);
        let execution = run_iterative(&client, &configuration, &settings)
            .await
            .map_err(|err| format!("run failed: {}", err))?;

        if execution.return_code != 0 {
            return Err(format!("Unexpected return code: {}", execution.return_code));
        }
        for name in ["server", "client"] {
            if !execution.job_results.jobs.contains_key(name) {
                return Err(format!("Job {} missing from results", name));
            }
        }

        let events = agent.state.events();
        let server_start = event_position(&events, "start server")?;
        let client_start = event_position(&events, "start client")?;
        let client_stop = event_position(&events, "stop client")?;
        let server_stop = event_position(&events, "stop server")?;
        if server_start >= client_start {
            return Err(format!("Server must start before the client: {:?}", events));
        }
        if client_stop >= server_stop {
            return Err(format!(
                "Non-blocking server must stop after the client: {:?}",
                events
            ));
        }
        Ok(())
    })
}

#[test]
fn span_with_repeat_keeps_the_server_and_rotates_output() -> Result<(), String> {
    run_async_test(async {
        let (url, agent) = spawn_agent(default_measurements(), default_metadata())?;
        let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let config = json!({
            "jobs": {
                "srv": { "executable": "server-bin", "endpoints": [url], "waitForExit": false },
                "clt": { "executable": "client-bin", "endpoints": [url], "waitForExit": true }
            },
            "scenarios": {
                "s": {
                    "server": { "job": "srv" },
                    "loadgen": { "job": "clt" }
                }
            }
        });

        let client =
            benchctl::agent::build_client().map_err(|err| format!("client failed: {}", err))?;
        let configuration = assemble_from(&client, dir.path(), &config, "s").await?;
        preflight(&client, &configuration)
            .await
            .map_err(|err| format!("preflight failed: {}", err))?;

        let output = dir.path().join("out.json");
        let mut settings = base_settings(&output);
        settings.span = Some(Duration::from_secs(5));
        settings.repeat = Some("loadgen".to_owned());

        let execution = run_iterative(&client, &configuration, &settings)
            .await
            .map_err(|err| format!("run failed: {}", err))?;
        if execution.return_code != 0 {
            return Err(format!("Unexpected return code: {}", execution.return_code));
        }

        if agent.state.count_events("start server") != 1 {
            return Err(format!(
                "Server must start exactly once: {:?}",
                agent.state.events()
            ));
        }
        if agent.state.count_events("start loadgen") < 2 {
            return Err(format!(
                "Loadgen must restart across passes: {:?}",
                agent.state.events()
            ));
        }
        if agent.state.count_events("stop server") != 1 {
            return Err(format!(
                "Server must stop exactly once, at span end: {:?}",
                agent.state.events()
            ));
        }
        for rotated in ["out-1.json", "out-2.json"] {
            if !dir.path().join(rotated).exists() {
                return Err(format!("Missing rotated output {}", rotated));
            }
        }
        Ok(())
    })
}

#[test]
fn failed_blocking_job_aborts_the_iteration_and_fails_the_run() -> Result<(), String> {
    run_async_test(async {
        let (url, agent) = spawn_agent(default_measurements(), default_metadata())?;
        let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let config = json!({
            "jobs": {
                "bad": { "executable": "fail-bin", "endpoints": [url], "waitForExit": true },
                "good": { "executable": "echo", "endpoints": [url], "waitForExit": true }
            },
            "scenarios": {
                "s": {
                    "first": { "job": "bad" },
                    "second": { "job": "good" }
                }
            }
        });

        let client =
            benchctl::agent::build_client().map_err(|err| format!("client failed: {}", err))?;
        let configuration = assemble_from(&client, dir.path(), &config, "s").await?;
        preflight(&client, &configuration)
            .await
            .map_err(|err| format!("preflight failed: {}", err))?;

        let settings = RunSettings {
            iterations: 1,
            session: "session-e2e".to_owned(),
            run_id: "run-e2e".to_owned(),
            ..Default::default()
        };
        let execution = run_iterative(&client, &configuration, &settings)
            .await
            .map_err(|err| format!("run failed: {}", err))?;

        if execution.return_code == 0 {
            return Err("A failed blocking job must produce a nonzero return code".to_owned());
        }
        let events = agent.state.events();
        if !events.iter().any(|event| event == "start first") {
            return Err(format!("Failing job never started: {:?}", events));
        }
        if events.iter().any(|event| event == "start second") {
            return Err(format!(
                "Dependencies after a failed job must not start: {:?}",
                events
            ));
        }
        Ok(())
    })
}

#[test]
fn failed_non_blocking_job_fails_the_run() -> Result<(), String> {
    run_async_test(async {
        let (url, agent) = spawn_agent(default_measurements(), default_metadata())?;
        let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let config = json!({
            "jobs": {
                "bad": { "executable": "fail-bin", "endpoints": [url], "waitForExit": false }
            },
            "scenarios": { "s": { "srv": { "job": "bad" } } }
        });

        let client =
            benchctl::agent::build_client().map_err(|err| format!("client failed: {}", err))?;
        let configuration = assemble_from(&client, dir.path(), &config, "s").await?;
        preflight(&client, &configuration)
            .await
            .map_err(|err| format!("preflight failed: {}", err))?;

        let settings = RunSettings {
            iterations: 1,
            session: "session-e2e".to_owned(),
            run_id: "run-e2e".to_owned(),
            ..Default::default()
        };
        let execution = run_iterative(&client, &configuration, &settings)
            .await
            .map_err(|err| format!("run failed: {}", err))?;

        if execution.return_code == 0 {
            return Err(
                "A non-blocking job observed as Failed must produce a nonzero return code"
                    .to_owned(),
            );
        }
        let events = agent.state.events();
        for needle in ["start srv", "stop srv"] {
            if !events.iter().any(|event| event == needle) {
                return Err(format!("Missing event '{}' in {:?}", needle, events));
            }
        }
        Ok(())
    })
}

#[test]
fn auto_flush_cuts_one_document_per_delimiter() -> Result<(), String> {
    run_async_test(async {
        let measurements = vec![
            json!({ "name": "rps", "timestamp": "", "value": 10 }),
            json!({ "name": "rps", "timestamp": "", "value": 30 }),
            json!({ "name": "", "timestamp": "", "value": null, "isDelimiter": true }),
        ];
        let (url, agent) = spawn_agent(measurements, default_metadata())?;
        let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let config = json!({
            "jobs": {
                "server": { "executable": "echo", "endpoints": [url], "waitForExit": true }
            },
            "scenarios": { "s": { "srv": { "job": "server" } } }
        });

        let client =
            benchctl::agent::build_client().map_err(|err| format!("client failed: {}", err))?;
        let configuration = assemble_from(&client, dir.path(), &config, "s").await?;
        preflight(&client, &configuration)
            .await
            .map_err(|err| format!("preflight failed: {}", err))?;

        let output = dir.path().join("out.json");
        let settings = base_settings(&output);
        let execution = run_auto_flush(&client, &configuration, &settings)
            .await
            .map_err(|err| format!("run failed: {}", err))?;

        if execution.return_code != 0 {
            return Err(format!("Unexpected return code: {}", execution.return_code));
        }
        if agent.state.count_events("flush srv") != 1 {
            return Err(format!(
                "Exactly one flush expected: {:?}",
                agent.state.events()
            ));
        }

        let first = dir.path().join("out-1.json");
        if !first.exists() {
            return Err("Missing auto-flush window document".to_owned());
        }
        if dir.path().join("out-2.json").exists() {
            return Err("A second window document must not exist".to_owned());
        }
        let raw = std::fs::read_to_string(&first).map_err(|err| format!("read failed: {}", err))?;
        let document: Value =
            serde_json::from_str(&raw).map_err(|err| format!("parse failed: {}", err))?;
        if document.pointer("/jobResults/jobs/srv/results/rps") != Some(&json!(30)) {
            return Err("Window document does not cover the pre-delimiter samples".to_owned());
        }
        Ok(())
    })
}
