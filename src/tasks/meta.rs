// ABOUTME: Rendered metadata and task body models of the built-in run task executor
// ABOUTME: Meta carries identity, action, object name, retry and timeout; the body carries commands

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;

/// What a task does to the object it names. Only `put` creates something
/// that can be compensated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Put,
    #[default]
    Get,
    Delete,
    Patch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaTask {
    pub id: String,
    #[serde(default)]
    pub action: TaskAction,
    #[serde(rename = "objectName", default)]
    pub object_name: Option<String>,
    #[serde(default)]
    pub disable: bool,
    #[serde(default)]
    pub retry: Option<RetrySpec>,
    #[serde(with = "humantime_serde", default)]
    pub timeout: Option<Duration>,
}

impl MetaTask {
    /// Object name from the meta block, trimmed; `None` when blank
    pub fn object_name(&self) -> Option<&str> {
        self.object_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySpec {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(with = "humantime_serde", default = "default_initial_delay")]
    pub initial_delay: Duration,
}

impl Default for RetrySpec {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay: default_initial_delay(),
        }
    }
}

/// Upper bound on a single backoff sleep
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

impl RetrySpec {
    /// Delay before retry number `retry` (zero based), capped at `MAX_RETRY_DELAY`
    pub fn delay_for(&self, retry: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.max(1.0).powi(retry as i32);
        Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * factor)
            .map(|delay| delay.min(MAX_RETRY_DELAY))
            .unwrap_or(MAX_RETRY_DELAY)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier <= 0.0 {
            return Err(format!(
                "backoff_multiplier must be a finite number greater than 0, got {}",
                self.backoff_multiplier
            ));
        }
        Ok(())
    }

    /// At least one attempt is always made
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

/// A process to run: either `command` + `args` or a `script` handed to `shell -c`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<String>,
}

impl Default for CommandSpec {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            script: None,
            shell: default_shell(),
            env: HashMap::new(),
            working_dir: None,
        }
    }
}

impl CommandSpec {
    pub fn is_empty(&self) -> bool {
        let blank = |s: &Option<String>| s.as_deref().map(str::trim).unwrap_or("").is_empty();
        blank(&self.command) && blank(&self.script)
    }

    /// Short human readable form for logs
    pub fn describe(&self) -> String {
        match (&self.command, &self.script) {
            (Some(command), _) if self.args.is_empty() => command.clone(),
            (Some(command), _) => format!("{} {}", command, self.args.join(" ")),
            (None, Some(_)) => format!("{} script", self.shell),
            (None, None) => "<none>".to_string(),
        }
    }
}

/// Rendered task body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskBody {
    #[serde(flatten)]
    pub run: CommandSpec,
    /// Literal result recorded when no command is given
    #[serde(default)]
    pub result: Option<JsonValue>,
    /// Compensating command, run once per created object with `OBJECT_NAME` set
    #[serde(default)]
    pub rollback: Option<CommandSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_defaults() {
        let meta: MetaTask = serde_yaml::from_str("id: mkdir").unwrap();
        assert_eq!(meta.id, "mkdir");
        assert_eq!(meta.action, TaskAction::Get);
        assert!(meta.object_name().is_none());
        assert!(!meta.disable);
        assert!(meta.retry.is_none());
        assert!(meta.timeout.is_none());
    }

    #[test]
    fn test_meta_full() {
        let yaml = r#"
id: vol-create
action: put
objectName: " vol1,vol2 "
timeout: 30s
retry:
  max_attempts: 3
  initial_delay: 100ms
"#;
        let meta: MetaTask = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(meta.action, TaskAction::Put);
        assert_eq!(meta.object_name(), Some("vol1,vol2"));
        assert_eq!(meta.timeout, Some(Duration::from_secs(30)));

        let retry = meta.retry.unwrap();
        assert_eq!(retry.attempts(), 3);
        assert_eq!(retry.backoff_multiplier, 2.0);
        assert_eq!(retry.delay_for(0), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn test_huge_backoff_is_capped() {
        let yaml = r#"
id: x
retry:
  max_attempts: 3
  backoff_multiplier: 1e300
  initial_delay: 1s
"#;
        let meta: MetaTask = serde_yaml::from_str(yaml).unwrap();
        let retry = meta.retry.unwrap();
        assert!(retry.validate().is_ok());
        assert_eq!(retry.delay_for(0), Duration::from_secs(1));
        assert_eq!(retry.delay_for(1), MAX_RETRY_DELAY);
        assert_eq!(retry.delay_for(40), MAX_RETRY_DELAY);

        let slow = RetrySpec {
            initial_delay: Duration::from_secs(u64::MAX),
            ..RetrySpec::default()
        };
        assert_eq!(slow.delay_for(3), MAX_RETRY_DELAY);

        let immediate = RetrySpec {
            initial_delay: Duration::ZERO,
            backoff_multiplier: 1e300,
            ..RetrySpec::default()
        };
        assert_eq!(immediate.delay_for(5), Duration::ZERO);
    }

    #[test]
    fn test_invalid_backoff_multiplier() {
        for multiplier in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            let retry = RetrySpec {
                backoff_multiplier: multiplier,
                ..RetrySpec::default()
            };
            assert!(retry.validate().is_err(), "accepted {}", multiplier);
        }
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!(serde_yaml::from_str::<MetaTask>("id: x\naction: create").is_err());
    }

    #[test]
    fn test_task_body_parsing() {
        let yaml = r#"
command: mkdir
args: ["-p", "/tmp/vol1"]
env:
  MODE: "0755"
rollback:
  script: rm -rf "/tmp/$OBJECT_NAME"
"#;
        let body: TaskBody = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(body.run.command.as_deref(), Some("mkdir"));
        assert_eq!(body.run.args, vec!["-p", "/tmp/vol1"]);
        assert_eq!(body.run.shell, "/bin/sh");
        assert_eq!(body.run.describe(), "mkdir -p /tmp/vol1");

        let rollback = body.rollback.unwrap();
        assert!(!rollback.is_empty());
        assert_eq!(rollback.describe(), "/bin/sh script");
    }

    #[test]
    fn test_literal_result_body() {
        let body: TaskBody = serde_yaml::from_str("result:\n  objectName: vol9\n").unwrap();
        assert!(body.run.is_empty());
        assert_eq!(body.result.unwrap()["objectName"], "vol9");
    }
}
