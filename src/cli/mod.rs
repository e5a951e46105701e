// ABOUTME: CLI module for the rungroup binary
// ABOUTME: Exports argument parsing, configuration and the application driver

pub mod app;
pub mod args;
pub mod commands;
pub mod config;

pub use app::App;
pub use args::{Args, Commands};
pub use config::Config;
