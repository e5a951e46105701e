// ABOUTME: Task group execution engine for rungroup
// ABOUTME: Shared context, executor contracts, the sequential runner and the plan catalog

pub mod context;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod runner;

pub use context::Values;
pub use error::{ExecutionError, Result};
pub use executor::{ExecutorFactory, FallbackRunner, RollbackAction, TaskExecutor};
pub use fallback::PlanCatalog;
pub use runner::TaskGroupRunner;
