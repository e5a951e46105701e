// ABOUTME: Task group runner executing run tasks in sequence against a shared context
// ABOUTME: Plans rollbacks per task, compensates in reverse order on failure and falls back on version mismatch

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::context::Values;
use super::error::{ExecutionError, Result};
use super::executor::{ExecutorFactory, FallbackRunner, RollbackAction, TaskExecutor};
use crate::parser::{RunTask, TaskGroupPlan};

/// Runs a set of run tasks in registration order.
///
/// A runner serves one logical run: [`TaskGroupRunner::run`] consumes it, so
/// the identity set and the rollback plan can never leak into a second run.
pub struct TaskGroupRunner {
    factory: Arc<dyn ExecutorFactory>,
    fallback_runner: Option<Arc<dyn FallbackRunner>>,
    /// Lower cased identities of the tasks executed so far
    all_task_ids: HashSet<String>,
    all_tasks: Vec<RunTask>,
    output_task: Option<RunTask>,
    /// Plan to run on a version mismatch; empty means none
    fallback_plan: String,
    /// Compensating actions in planning order, drained back to front
    rollbacks: Vec<Box<dyn RollbackAction>>,
}

impl TaskGroupRunner {
    pub fn new(factory: Arc<dyn ExecutorFactory>) -> Self {
        Self {
            factory,
            fallback_runner: None,
            all_task_ids: HashSet::new(),
            all_tasks: Vec::new(),
            output_task: None,
            fallback_plan: String::new(),
            rollbacks: Vec::new(),
        }
    }

    pub fn with_fallback_runner(mut self, fallback_runner: Arc<dyn FallbackRunner>) -> Self {
        self.fallback_runner = Some(fallback_runner);
        self
    }

    /// Register every task, the output task and the fallback of a plan
    pub fn from_plan(plan: &TaskGroupPlan, factory: Arc<dyn ExecutorFactory>) -> Result<Self> {
        let mut runner = Self::new(factory);
        for task in &plan.tasks {
            runner.add_run_task(task.clone())?;
        }
        if let Some(output) = &plan.output {
            runner.set_output_task(output.clone())?;
        }
        runner.set_fallback(plan.fallback_plan());
        Ok(runner)
    }

    /// Append a task. Identities are only checked at execution time since
    /// they come from rendered metadata.
    pub fn add_run_task(&mut self, task: RunTask) -> Result<()> {
        if !task.has_meta() {
            return Err(ExecutionError::InvalidTask {
                name: task.name,
                reason: "failed to add run task: nil meta task specs found".to_string(),
            });
        }

        self.all_tasks.push(task);
        Ok(())
    }

    /// Set the task whose rendering becomes this group's output
    pub fn set_output_task(&mut self, task: RunTask) -> Result<()> {
        if !task.has_meta() {
            return Err(ExecutionError::InvalidTask {
                name: task.name,
                reason: "failed to set output task: nil meta task specs found".to_string(),
            });
        }

        if !task.has_task() {
            return Err(ExecutionError::InvalidTask {
                name: task.name,
                reason: "failed to set output task: nil task specs found".to_string(),
            });
        }

        self.output_task = Some(task);
        Ok(())
    }

    pub fn set_fallback(&mut self, plan: &str) {
        self.fallback_plan = plan.trim().to_string();
    }

    pub fn fallback_plan(&self) -> &str {
        &self.fallback_plan
    }

    pub fn task_count(&self) -> usize {
        self.all_tasks.len()
    }

    /// Records the identity and reports whether it was unseen in this run
    fn is_task_id_unique(&mut self, identity: &str) -> bool {
        self.all_task_ids.insert(identity.to_lowercase())
    }

    /// Plan compensation for each comma separated object the task created.
    /// Nothing is undone here.
    fn plan_for_rollback(&mut self, executor: &dyn TaskExecutor, object_names: &str) -> Result<()> {
        for name in object_names.split(',').map(str::trim) {
            if name.is_empty() {
                continue;
            }

            match executor.as_rollback_instance(name)? {
                Some(action) => {
                    debug!("Planned rollback for task '{}': {}", executor.identity(), action);
                    self.rollbacks.push(action);
                }
                None => continue,
            }
        }

        Ok(())
    }

    /// Execute planned compensations, most recent first. Failures are logged
    /// and the remaining actions still run.
    async fn rollback(&mut self) {
        if self.rollbacks.is_empty() {
            warn!("Nothing to rollback: no rollback tasks were found");
            return;
        }

        warn!(
            "Will rollback {} previously executed run task object(s)",
            self.rollbacks.len()
        );

        while let Some(action) = self.rollbacks.pop() {
            match action.execute_it().await {
                Ok(()) => info!("Rolled back {}", action),
                Err(e) => warn!("Failed to rollback run task: '{}': error '{}'", action, e),
            }
        }
    }

    async fn fallback(&self, runner: &dyn FallbackRunner, values: &mut Values) -> Result<Vec<u8>> {
        warn!("Task group runner will fallback to '{}'", self.fallback_plan);
        runner.run_fallback(&self.fallback_plan, values).await
    }

    /// Run one task: build its executor, enforce identity uniqueness, execute,
    /// redact the raw result and plan its rollback.
    async fn run_a_task(&mut self, task: &RunTask, values: &mut Values) -> Result<()> {
        let mut executor = match self.factory.new_executor(task, values) {
            Ok(executor) => executor,
            Err(e) => {
                values.redact_json_result();
                error!(
                    task = %task.name,
                    meta = %task.spec.meta,
                    values = %values.to_yaml(),
                    "Failed to initialize run task executor: {}",
                    e
                );
                return Err(e);
            }
        };

        let identity = executor.identity().to_string();
        if !self.is_task_id_unique(&identity) {
            values.redact_json_result();
            return Err(ExecutionError::DuplicateIdentity { id: identity });
        }

        debug!("Executing run task '{}' (id: {})", task.name, identity);
        let exec_result = executor.execute(values).await;

        // the raw payload is not used past this point
        values.redact_json_result();

        if let Err(ref e) = exec_result {
            error!(
                task = %task.name,
                id = %identity,
                meta = %task.spec.meta,
                spec = %task.spec.task,
                values = %values.to_yaml(),
                "Failed to execute run task: {}",
                e
            );
        }

        let object_names = values.object_names(&identity).unwrap_or_default().to_string();
        let plan_result = self.plan_for_rollback(executor.as_ref(), &object_names);
        if let Err(ref e) = plan_result {
            error!(task = %task.name, id = %identity, "Failed to plan for rollback: {}", e);
        }

        resolve_step_error(exec_result, plan_result)
    }

    /// Run every task in order, stopping at the first failure
    async fn run_all_tasks(&mut self, values: &mut Values) -> Result<()> {
        let tasks = std::mem::take(&mut self.all_tasks);

        let mut outcome = Ok(());
        for task in &tasks {
            if let Err(e) = self.run_a_task(task, values).await {
                outcome = Err(e);
                break;
            }
        }

        self.all_tasks = tasks;
        outcome
    }

    /// Extract the group output once all tasks succeeded
    async fn run_output(&self, values: &Values) -> Result<Vec<u8>> {
        let Some(output_task) = self.output_task.as_ref().filter(|t| t.has_task()) else {
            return Ok(Vec::new());
        };

        let executor = self.factory.new_executor(output_task, values)?;
        executor.output(values).await.map_err(|e| {
            error!(
                task = %output_task.name,
                values = %values.to_yaml(),
                "Failed to execute output task: {}",
                e
            );
            e
        })
    }

    /// Run all tasks and return the group output.
    ///
    /// On failure the planned rollbacks run in reverse order. A version
    /// mismatch with a configured fallback plan then hands the (already
    /// mutated) context to the fallback runner, whose result replaces the
    /// original error.
    #[instrument(skip_all)]
    pub async fn run(mut self, values: &mut Values) -> Result<Vec<u8>> {
        info!(
            "Running task group: {} task(s), output task: {}, fallback: '{}'",
            self.all_tasks.len(),
            self.output_task.is_some(),
            self.fallback_plan
        );

        let outcome = self.run_all_tasks(values).await;
        values.redact_json_result();

        let err = match outcome {
            Ok(()) => return self.run_output(values).await,
            Err(e) => e,
        };

        warn!("{}: failed to execute run tasks", err);
        self.rollback().await;

        if err.is_version_mismatch() && !self.fallback_plan.is_empty() {
            match self.fallback_runner.clone() {
                Some(runner) => return self.fallback(runner.as_ref(), values).await,
                None => warn!(
                    "Fallback '{}' configured but no fallback runner is available",
                    self.fallback_plan
                ),
            }
        }

        Err(err)
    }
}

/// An execution failure outranks a rollback planning failure
fn resolve_step_error(execution: Result<()>, planning: Result<()>) -> Result<()> {
    match (execution, planning) {
        (Err(e), _) => Err(e),
        (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}

impl std::fmt::Debug for TaskGroupRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGroupRunner")
            .field("tasks", &self.all_tasks.len())
            .field("output_task", &self.output_task.as_ref().map(|t| &t.name))
            .field("fallback_plan", &self.fallback_plan)
            .field("planned_rollbacks", &self.rollbacks.len())
            .finish()
    }
}
