pub mod config;
pub mod evaluate;
pub mod executor;
pub mod pipeline;
pub mod registry;
pub mod workspace;

pub use executor::{ExecutionRequest, ExecutionResult, Executor, Outcome};
