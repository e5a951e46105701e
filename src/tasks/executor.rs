// ABOUTME: Built-in run task executor rendering meta and task templates against the shared context
// ABOUTME: Runs the task command, records its results and hands out command rollbacks for put tasks

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use super::command::CommandRunner;
use super::meta::{CommandSpec, MetaTask, TaskAction, TaskBody};
use super::rollback::CommandRollback;
use crate::engine::context::{Values, OBJECT_NAME_KEY};
use crate::engine::error::{ExecutionError, Result};
use crate::engine::executor::{ExecutorFactory, RollbackAction, TaskExecutor};
use crate::parser::RunTask;
use crate::template::{TemplateEngine, TemplateError};

/// Field under `TaskResult.<id>` holding the decoded command output
pub const RESULT_KEY: &str = "result";

/// Builds [`RunTaskExecutor`]s sharing one template engine
#[derive(Debug, Clone)]
pub struct DefaultExecutorFactory {
    engine: TemplateEngine,
}

impl DefaultExecutorFactory {
    /// Strict rendering: unresolved references fail executor construction
    pub fn new() -> Result<Self> {
        Self::with_strict_mode(true)
    }

    pub fn with_strict_mode(strict: bool) -> Result<Self> {
        Ok(Self {
            engine: TemplateEngine::with_strict_mode(strict)?,
        })
    }

    pub fn with_engine(engine: TemplateEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }
}

impl ExecutorFactory for DefaultExecutorFactory {
    fn new_executor(&self, task: &RunTask, values: &Values) -> Result<Box<dyn TaskExecutor>> {
        let executor = RunTaskExecutor::new(self.engine.clone(), task.clone(), values)?;
        Ok(Box::new(executor))
    }
}

/// Keep version mismatches intact so the runner can classify them
fn classify(
    e: TemplateError,
    otherwise: impl FnOnce(TemplateError) -> ExecutionError,
) -> ExecutionError {
    if e.is_version_mismatch() {
        ExecutionError::TemplateError(e)
    } else {
        otherwise(e)
    }
}

pub struct RunTaskExecutor {
    engine: TemplateEngine,
    task: RunTask,
    meta: MetaTask,
    /// Known once the task body has been rendered
    rollback: Option<CommandSpec>,
}

impl RunTaskExecutor {
    /// Render the meta block against the current context
    pub fn new(engine: TemplateEngine, task: RunTask, values: &Values) -> Result<Self> {
        let mut meta: MetaTask = engine
            .render_yaml(&task.spec.meta, &values.to_json())
            .map_err(|e| {
                classify(e, |e| ExecutionError::InvalidMeta {
                    name: task.name.clone(),
                    reason: e.to_string(),
                })
            })?;

        meta.id = meta.id.trim().to_string();
        if meta.id.is_empty() {
            return Err(ExecutionError::InvalidMeta {
                name: task.name.clone(),
                reason: "missing task id".to_string(),
            });
        }

        if let Some(retry) = &meta.retry {
            retry
                .validate()
                .map_err(|reason| ExecutionError::InvalidMeta {
                    name: task.name.clone(),
                    reason,
                })?;
        }

        Ok(Self {
            engine,
            task,
            meta,
            rollback: None,
        })
    }

    pub fn meta(&self) -> &MetaTask {
        &self.meta
    }

    fn render_body(&self, values: &Values) -> Result<TaskBody> {
        if !self.task.has_task() {
            return Ok(TaskBody::default());
        }

        let rendered = self
            .engine
            .render_template(&self.task.spec.task, &values.to_json())
            .map_err(|e| classify(e, |e| self.invalid_spec(e.to_string())))?;

        if rendered.trim().is_empty() {
            return Ok(TaskBody::default());
        }

        serde_yaml::from_str(&rendered).map_err(|e| self.invalid_spec(e.to_string()))
    }

    fn invalid_spec(&self, reason: String) -> ExecutionError {
        ExecutionError::InvalidTaskSpec {
            name: self.task.name.clone(),
            reason,
        }
    }

    /// Raw payload and its decoded form
    async fn produce(&self, body: TaskBody) -> Result<(String, JsonValue)> {
        if body.run.is_empty() {
            let result = body.result.unwrap_or(JsonValue::Null);
            let raw = serde_json::to_string(&result)?;
            return Ok((raw, result));
        }

        let output = CommandRunner::new(&self.meta.id)
            .with_timeout(self.meta.timeout)
            .run_with_retry(&body.run, self.meta.retry.as_ref())
            .await?;

        let trimmed = output.stdout.trim();
        let decoded = serde_json::from_str(trimmed)
            .unwrap_or_else(|_| JsonValue::String(trimmed.to_string()));
        Ok((output.stdout, decoded))
    }
}

#[async_trait]
impl TaskExecutor for RunTaskExecutor {
    fn identity(&self) -> &str {
        &self.meta.id
    }

    async fn execute(&mut self, values: &mut Values) -> Result<()> {
        if self.meta.disable {
            info!("Run task '{}' is disabled, skipping", self.task.name);
            return Ok(());
        }

        debug!("Executing run task '{}' as {:?}", self.meta.id, self.meta.action);

        // recorded up front so a failing command still gets compensated
        if let Some(name) = self.meta.object_name() {
            values.set_task_result(
                &self.meta.id,
                OBJECT_NAME_KEY,
                JsonValue::String(name.to_string()),
            );
        }

        let body = self.render_body(values)?;
        self.rollback = body.rollback.clone().filter(|spec| !spec.is_empty());

        let (raw, decoded) = self.produce(body).await?;
        debug!("Run task '{}' produced {} byte(s)", self.task.name, raw.len());

        if self.meta.object_name().is_none() {
            if let Some(name) = decoded.get(OBJECT_NAME_KEY).and_then(JsonValue::as_str) {
                values.set_task_result(
                    &self.meta.id,
                    OBJECT_NAME_KEY,
                    JsonValue::String(name.to_string()),
                );
            }
        }

        values.set_json_result(raw);
        values.set_task_result(&self.meta.id, RESULT_KEY, decoded);
        Ok(())
    }

    async fn output(&self, values: &Values) -> Result<Vec<u8>> {
        self.engine
            .render_yaml_as_json(&self.task.spec.task, &values.to_json())
            .map_err(|e| {
                classify(e, |e| ExecutionError::OutputFailed {
                    name: self.task.name.clone(),
                    message: e.to_string(),
                })
            })
    }

    fn as_rollback_instance(&self, object_name: &str) -> Result<Option<Box<dyn RollbackAction>>> {
        let object_name = object_name.trim();
        if self.meta.action != TaskAction::Put || object_name.is_empty() {
            return Ok(None);
        }

        Ok(self.rollback.as_ref().map(|spec| {
            Box::new(CommandRollback::new(
                &self.meta.id,
                object_name,
                spec.clone(),
                self.meta.timeout,
            )) as Box<dyn RollbackAction>
        }))
    }
}
