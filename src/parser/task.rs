// ABOUTME: Run task data structures read from task group plans
// ABOUTME: A run task pairs a metadata template with an optional executable task body template

use serde::{Deserialize, Serialize};

/// A named, declarative unit of work. Both blocks are handlebars templates
/// rendering to YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTask {
    pub name: String,
    #[serde(default)]
    pub spec: RunTaskSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTaskSpec {
    /// Metadata template; renders to the task identity, action and object name
    #[serde(default)]
    pub meta: String,
    /// Task body template; empty when the task only describes output
    #[serde(default)]
    pub task: String,
}

impl RunTask {
    pub fn new(name: impl Into<String>, meta: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: RunTaskSpec {
                meta: meta.into(),
                task: task.into(),
            },
        }
    }

    pub fn has_meta(&self) -> bool {
        !self.spec.meta.trim().is_empty()
    }

    pub fn has_task(&self) -> bool {
        !self.spec.task.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_task_deserialization() {
        let yaml = r#"
name: create-dir
spec:
  meta: |
    id: mkdir
    action: put
  task: |
    command: mkdir
"#;
        let task: RunTask = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(task.name, "create-dir");
        assert!(task.has_meta());
        assert!(task.has_task());
        assert!(task.spec.meta.contains("id: mkdir"));
    }

    #[test]
    fn test_blank_blocks_count_as_empty() {
        let task = RunTask::new("blank", "  \n", "");
        assert!(!task.has_meta());
        assert!(!task.has_task());
    }
}
