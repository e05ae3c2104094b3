pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod extract;
pub mod output;
pub mod resolve;
pub mod run;
pub mod runtime;

pub use commands::Commands;
pub use env::CliArgs;
