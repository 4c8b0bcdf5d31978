use std::future::Future;

use serde_json::json;
use tempfile::tempdir;

use super::db::{BenchmarkRow, SqlSettings, sanitized_table_name, write_row};
use super::json::{rotated_path, write_result_file};

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

#[test]
fn rotation_picks_the_first_free_numbered_name() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let base = dir.path().join("out.json");

    let first = rotated_path(&base);
    if first != dir.path().join("out-1.json") {
        return Err(format!("Unexpected first rotation: {:?}", first));
    }

    std::fs::write(&first, "{}").map_err(|err| format!("write failed: {}", err))?;
    let second = rotated_path(&base);
    if second != dir.path().join("out-2.json") {
        return Err(format!("Unexpected second rotation: {:?}", second));
    }
    Ok(())
}

#[test]
fn result_files_round_trip_through_json() -> Result<(), String> {
    run_async_test(async {
        let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let path = dir.path().join("out.json");
        let document = json!({ "jobResults": { "jobs": {}, "properties": { "a": "1" } } });

        let written = write_result_file(&path, false, &document)
            .await
            .map_err(|err| format!("write failed: {}", err))?;
        let raw =
            std::fs::read_to_string(&written).map_err(|err| format!("read failed: {}", err))?;
        let reloaded: serde_json::Value =
            serde_json::from_str(&raw).map_err(|err| format!("parse failed: {}", err))?;
        if reloaded != document {
            return Err("Document changed across the round trip".to_owned());
        }
        Ok(())
    })
}

#[test]
fn sql_sink_creates_the_table_and_appends_rows() -> Result<(), String> {
    run_async_test(async {
        let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let database = dir.path().join("results.db");
        let settings = SqlSettings {
            connection: database.to_string_lossy().into_owned(),
            table: "Benchmarks".to_owned(),
        };

        let row = BenchmarkRow::build(
            "session-1",
            Some("s"),
            None,
            "run-1",
            &json!({ "jobs": {} }),
        )
        .map_err(|err| format!("row build failed: {}", err))?;
        write_row(&settings, row.clone())
            .await
            .map_err(|err| format!("first write failed: {}", err))?;
        write_row(&settings, row)
            .await
            .map_err(|err| format!("second write failed: {}", err))?;

        let conn = rusqlite::Connection::open(&database)
            .map_err(|err| format!("open failed: {}", err))?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM Benchmarks", [], |row| row.get(0))
            .map_err(|err| format!("count failed: {}", err))?;
        if count != 2 {
            return Err(format!("Expected 2 rows, got {}", count));
        }
        let session: String = conn
            .query_row("SELECT session FROM Benchmarks LIMIT 1", [], |row| {
                row.get(0)
            })
            .map_err(|err| format!("select failed: {}", err))?;
        if session != "session-1" {
            return Err(format!("Unexpected session: {}", session));
        }
        Ok(())
    })
}

#[test]
fn table_names_are_restricted_to_identifier_characters() -> Result<(), String> {
    if sanitized_table_name("Bench marks; DROP") != "BenchmarksDROP" {
        return Err("Sanitizer did not strip punctuation".to_owned());
    }
    if sanitized_table_name(";;") != "Benchmarks" {
        return Err("Empty result must fall back to the default table".to_owned());
    }
    Ok(())
}
