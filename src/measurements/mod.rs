//! Measurement aggregation: per-agent aggregate, cross-agent reduce, and
//! text rendering of job summaries.
mod aggregate;
mod display;
mod operation;


pub use aggregate::{aggregate_agent, normalize, reduce_agents};
pub use display::render_job_summary;
pub use operation::Operation;
