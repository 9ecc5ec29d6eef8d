//! Core types and functionality for flowgate.
//!
//! Application configuration and bounded command execution.

mod config;
pub(crate) mod executor;

pub use config::{
    resolve_path, Config, ContextConfig, GeneralConfig, LoggingConfig, LOCAL_CONFIG_FILE,
};
pub use executor::{ExecError, ExecutionResult, Executor};
