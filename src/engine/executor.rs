// ABOUTME: Contracts between the task group runner and the code that executes single run tasks
// ABOUTME: Defines executor construction, execution, output extraction, rollback instances and fallback

use async_trait::async_trait;
use std::fmt;

use super::context::Values;
use super::error::Result;
use crate::parser::RunTask;

/// Builds an executor bound to one run task, resolved against the current
/// context. Fails when the task cannot be resolved, e.g. an unresolved
/// template reference in its meta block.
pub trait ExecutorFactory: Send + Sync {
    fn new_executor(&self, task: &RunTask, values: &Values) -> Result<Box<dyn TaskExecutor>>;
}

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Identity derived from the task's rendered metadata
    fn identity(&self) -> &str;

    /// Run the task, recording its results into `values`
    async fn execute(&mut self, values: &mut Values) -> Result<()>;

    /// Render the byte output of an output task
    async fn output(&self, values: &Values) -> Result<Vec<u8>>;

    /// Compensating action for one object this task created, or `None` when
    /// the object needs no compensation
    fn as_rollback_instance(&self, object_name: &str) -> Result<Option<Box<dyn RollbackAction>>>;
}

#[async_trait]
pub trait RollbackAction: fmt::Display + Send + Sync {
    async fn execute_it(&self) -> Result<()>;
}

/// Runs an alternate plan when a group fails with a version mismatch
#[async_trait]
pub trait FallbackRunner: Send + Sync {
    async fn run_fallback(&self, plan: &str, values: &mut Values) -> Result<Vec<u8>>;
}
