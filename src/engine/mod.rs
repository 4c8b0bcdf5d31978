//! Execution engine: drives the selected jobs through their lifecycle across
//! one or more agent endpoints.
mod autoflush;
mod fleet;
mod iterative;
mod output;
mod preflight;
pub mod results;


use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub use autoflush::run_auto_flush;
pub use iterative::run_iterative;
pub use preflight::preflight;

use crate::sinks::db::SqlSettings;

/// Everything the engine needs beyond the configuration itself.
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub iterations: u32,
    pub span: Option<Duration>,
    pub repeat: Option<String>,
    pub output: Option<PathBuf>,
    pub properties: BTreeMap<String, String>,
    pub session: String,
    pub description: Option<String>,
    pub scenario: Option<String>,
    pub run_id: String,
    pub no_measurements: bool,
    pub no_metadata: bool,
    pub sql: Option<SqlSettings>,
}

/// True before the repeat anchor while the span budget is running: those
/// jobs stay up across passes.
pub(crate) fn span_should_keep_running(
    name: &str,
    dependencies: &[String],
    settings: &RunSettings,
    started: std::time::Instant,
) -> bool {
    let Some(span) = settings.span else {
        return false;
    };
    if started.elapsed() > span {
        return false;
    }
    let Some(anchor) = settings.repeat.as_deref() else {
        return false;
    };
    let anchor_position = dependencies
        .iter()
        .position(|dependency| dependency.eq_ignore_ascii_case(anchor));
    let name_position = dependencies
        .iter()
        .position(|dependency| dependency.eq_ignore_ascii_case(name));
    match (name_position, anchor_position) {
        (Some(position), Some(anchor_position)) => position < anchor_position,
        _ => false,
    }
}

pub(crate) fn is_span_over(started: std::time::Instant, span: Option<Duration>) -> bool {
    span.is_none_or(|span| started.elapsed() > span)
}
