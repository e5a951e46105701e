// ABOUTME: Main library module for rungroup, a sequential run task group engine
// ABOUTME: Exports all core modules and provides the public API

pub mod cli;
pub mod engine;
pub mod parser;
pub mod tasks;
pub mod template;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use engine::{
    ExecutionError, ExecutorFactory, FallbackRunner, PlanCatalog, RollbackAction, TaskExecutor,
    TaskGroupRunner, Values,
};
pub use parser::{PlanParser, PlanValidator, RunTask, RunTaskSpec, TaskGroupPlan};
pub use tasks::DefaultExecutorFactory;
pub use template::{is_version_mismatch, TemplateEngine};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
