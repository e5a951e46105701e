// ABOUTME: Compensating action that undoes one object created by a put task
// ABOUTME: Runs the task's rollback command with OBJECT_NAME set to the object being undone

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::command::CommandRunner;
use super::meta::CommandSpec;
use crate::engine::error::{ExecutionError, Result};
use crate::engine::executor::RollbackAction;

/// Environment variable naming the object a rollback command must undo
pub const OBJECT_NAME_ENV: &str = "OBJECT_NAME";

#[derive(Debug, Clone)]
pub struct CommandRollback {
    task_id: String,
    object_name: String,
    spec: CommandSpec,
    timeout: Option<Duration>,
}

impl CommandRollback {
    pub fn new(
        task_id: impl Into<String>,
        object_name: impl Into<String>,
        spec: CommandSpec,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            object_name: object_name.into(),
            spec,
            timeout,
        }
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }
}

impl fmt::Display for CommandRollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rollback of '{}' created by task '{}' ({})",
            self.object_name,
            self.task_id,
            self.spec.describe()
        )
    }
}

#[async_trait]
impl RollbackAction for CommandRollback {
    async fn execute_it(&self) -> Result<()> {
        debug!("Executing {}", self);
        CommandRunner::new(&self.task_id)
            .with_timeout(self.timeout)
            .with_env(OBJECT_NAME_ENV, &self.object_name)
            .run_checked(&self.spec)
            .await
            .map(|_| ())
            .map_err(|e| ExecutionError::RollbackFailed {
                object: self.object_name.clone(),
                message: e.to_string(),
            })
    }
}
