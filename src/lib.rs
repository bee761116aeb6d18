pub mod client;
pub mod errors;
pub mod kanban_config;
pub mod prompt;
pub mod service;
pub mod telemetry;
