//! uifunnel library
//!
//! Configuration loading and pipeline assembly shared by the CLI and the
//! integration tests.

pub mod cli;
pub mod config;
pub mod pipeline;

pub use config::{AppConfig, ConfigError, LlmSettings};
