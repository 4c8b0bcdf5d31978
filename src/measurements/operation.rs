use serde::{Deserialize, Serialize};

/// Reduction applied to a measurement series, either per agent (`aggregate`)
/// or across agents (`reduce`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    All,
    First,
    Last,
    Avg,
    Count,
    Max,
    Median,
    Min,
    Sum,
    Delta,
}
