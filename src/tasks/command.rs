// ABOUTME: Process execution for run task commands and rollback commands
// ABOUTME: Runs a command or shell script with env, working dir, timeout and retry with backoff

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::meta::{CommandSpec, RetrySpec};
use crate::engine::error::{ExecutionError, Result};

/// Captured result of one finished process
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs [`CommandSpec`]s on behalf of one task
#[derive(Debug, Clone)]
pub struct CommandRunner {
    task_id: String,
    timeout: Option<Duration>,
    extra_env: HashMap<String, String>,
}

impl CommandRunner {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            timeout: None,
            extra_env: HashMap::new(),
        }
    }

    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// Extra environment applied on top of the command's own `env`
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.insert(key.into(), value.into());
        self
    }

    fn build_command(&self, spec: &CommandSpec) -> Result<Command> {
        let mut cmd = match (&spec.command, &spec.script) {
            (Some(command), _) if !command.trim().is_empty() => {
                let mut cmd = Command::new(command.trim());
                cmd.args(&spec.args);
                cmd
            }
            (_, Some(script)) if !script.trim().is_empty() => {
                let mut cmd = Command::new(&spec.shell);
                cmd.arg("-c").arg(script);
                cmd
            }
            _ => {
                return Err(ExecutionError::InvalidTaskSpec {
                    name: self.task_id.clone(),
                    reason: "either 'command' or 'script' must be provided".to_string(),
                })
            }
        };

        self.configure_command(&mut cmd, spec);
        Ok(cmd)
    }

    /// Configure common command settings (env, working_dir, stdio)
    fn configure_command(&self, cmd: &mut Command, spec: &CommandSpec) {
        for (key, value) in spec.env.iter().chain(self.extra_env.iter()) {
            cmd.env(key, value);
        }

        if let Some(ref working_dir) = spec.working_dir {
            cmd.current_dir(working_dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
    }

    /// Run once and capture output. A non-zero exit is not an error here.
    pub async fn run_once(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut cmd = self.build_command(spec)?;
        debug!("Task {}: running {}", self.task_id, spec.describe());

        let output = match self.timeout {
            Some(limit) => timeout(limit, cmd.output()).await.map_err(|_| {
                ExecutionError::TaskTimeout {
                    task_id: self.task_id.clone(),
                    timeout: limit,
                }
            })?,
            None => cmd.output().await,
        }
        .map_err(|e| ExecutionError::TaskFailed {
            task_id: self.task_id.clone(),
            message: format!("failed to start '{}': {}", spec.describe(), e),
        })?;

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        debug!(
            "Task {}: command completed with exit code: {}",
            self.task_id, result.exit_code
        );
        Ok(result)
    }

    /// Run once and turn a non-zero exit into [`ExecutionError::TaskFailed`]
    pub async fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run_once(spec).await?;
        if output.success() {
            return Ok(output);
        }

        let stderr = output.stderr.trim();
        Err(ExecutionError::TaskFailed {
            task_id: self.task_id.clone(),
            message: if stderr.is_empty() {
                format!("'{}' exited with code {}", spec.describe(), output.exit_code)
            } else {
                format!(
                    "'{}' exited with code {}: {}",
                    spec.describe(),
                    output.exit_code,
                    stderr
                )
            },
        })
    }

    /// Run with retries. Failures and timeouts are retried until attempts
    /// run out; the last error is returned.
    pub async fn run_with_retry(
        &self,
        spec: &CommandSpec,
        retry: Option<&RetrySpec>,
    ) -> Result<CommandOutput> {
        let retry = retry.cloned().unwrap_or_default();
        let attempts = retry.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if attempts > 1 {
                info!(
                    "Executing task {} (attempt {}/{})",
                    self.task_id, attempt, attempts
                );
            }

            match self.run_checked(spec).await {
                Ok(output) => return Ok(output),
                Err(e @ ExecutionError::InvalidTaskSpec { .. }) => return Err(e),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    let delay = retry.delay_for(attempt - 1);
                    warn!(
                        "Task {} failed on attempt {}: {}; retrying in {:?}",
                        self.task_id, attempt, e, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
