pub mod async_engine;
pub mod config;
pub mod engine;
pub mod error;
pub mod library;
pub mod registry;
pub mod schema;
pub mod task;
pub mod telemetry;
pub mod validation;
pub mod value;
