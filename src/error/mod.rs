mod agent;
mod app;
mod config;
mod engine;
mod sink;

pub use agent::AgentError;
pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use engine::EngineError;
pub use sink::SinkError;
