//! Common infrastructure for the murmur call stack
//!
//! Provides the pieces every murmur crate needs but none of them owns:
//!
//! - [`logging`]: tracing subscriber setup driven by a [`logging::LoggingConfig`]
//! - [`errors`]: a shared error type plus component/operation context helpers
//! - [`config`]: loading serde configuration structs from TOML or JSON files
//!   and reading typed overrides from the environment

pub mod config;
pub mod errors;
pub mod logging;

pub use errors::{Error, ErrorContext, ErrorExt, Result};
pub use logging::{LoggingConfig, setup_logging};
