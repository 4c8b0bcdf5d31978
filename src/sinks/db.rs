use serde::Serialize;
use tokio_rusqlite::Connection;
use tracing::info;

use crate::error::{AppError, AppResult, SinkError};

#[derive(Debug, Clone)]
pub struct SqlSettings {
    pub connection: String,
    pub table: String,
}

/// One benchmark table row; `document` is the serialized job results.
#[derive(Debug, Clone)]
pub struct BenchmarkRow {
    pub session: String,
    pub scenario: String,
    pub description: String,
    pub run_id: String,
    pub timestamp: String,
    pub document: String,
}

impl BenchmarkRow {
    pub fn build<T>(
        session: &str,
        scenario: Option<&str>,
        description: Option<&str>,
        run_id: &str,
        document: &T,
    ) -> AppResult<Self>
    where
        T: Serialize,
    {
        let document = serde_json::to_string(document).map_err(|err| {
            AppError::sink(SinkError::Serialize {
                context: "benchmark row document",
                source: err,
            })
        })?;
        Ok(Self {
            session: session.to_owned(),
            scenario: scenario.unwrap_or_default().to_owned(),
            description: description.unwrap_or_default().to_owned(),
            run_id: run_id.to_owned(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            document,
        })
    }
}

/// Appends one row, creating the table on first use.
pub async fn write_row(settings: &SqlSettings, row: BenchmarkRow) -> AppResult<()> {
    let connection = Connection::open(&settings.connection).await.map_err(|err| {
        AppError::sink(SinkError::Database {
            context: "open results database",
            source: err,
        })
    })?;

    let table = sanitize_table(&settings.table);
    let create = format!(
        "CREATE TABLE IF NOT EXISTS {table} (session TEXT, scenario TEXT, description TEXT, runId TEXT, timestamp TEXT, document TEXT)"
    );
    let insert = format!(
        "INSERT INTO {table} (session, scenario, description, runId, timestamp, document) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
    );

    connection
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute_batch(&create)?;
            tx.execute(
                &insert,
                rusqlite::params![
                    row.session,
                    row.scenario,
                    row.description,
                    row.run_id,
                    row.timestamp,
                    row.document
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|err| {
            AppError::sink(SinkError::Database {
                context: "write benchmark row",
                source: err,
            })
        })?;

    info!("Results recorded to table '{}'", table);
    Ok(())
}

/// Table names come from the command line; anything outside `[A-Za-z0-9_]`
/// is stripped before interpolation into SQL.
fn sanitize_table(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .collect();
    if cleaned.is_empty() {
        "Benchmarks".to_owned()
    } else {
        cleaned
    }
}

#[cfg(test)]
pub(super) fn sanitized_table_name(name: &str) -> String {
    sanitize_table(name)
}
