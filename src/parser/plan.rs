// ABOUTME: Task group plan structure and YAML parsing
// ABOUTME: A plan lists run tasks in execution order plus an optional output task and fallback plan

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::Path;
use tokio::fs;

use super::error::{ParserError, Result, ValidationError};
use super::task::RunTask;

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGroupPlan {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    /// Name of the plan to run instead when this one fails on a version mismatch
    #[serde(default)]
    pub fallback: Option<String>,
    /// Initial shared context entries, e.g. `Config` or `Volume`
    #[serde(default)]
    pub values: Map<String, JsonValue>,
    #[serde(default)]
    pub tasks: Vec<RunTask>,
    #[serde(default)]
    pub output: Option<RunTask>,
}

impl TaskGroupPlan {
    /// Parse plan from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ParserError::IoError)?;
        Self::from_yaml(&content)
    }

    /// Parse plan from YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let plan: TaskGroupPlan = serde_yaml::from_str(content).map_err(ParserError::YamlError)?;
        plan.validate_structure()?;
        Ok(plan)
    }

    /// Structural checks only; task identities are known after rendering
    fn validate_structure(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ParserError::MissingField("name".to_string()));
        }

        if self.tasks.is_empty() && self.output.is_none() {
            return Err(ParserError::ValidationError(ValidationError::EmptyPlan));
        }

        for task in &self.tasks {
            if !task.has_meta() {
                return Err(ParserError::ValidationError(ValidationError::EmptyMeta {
                    task: task.name.clone(),
                }));
            }
        }

        if let Some(output) = &self.output {
            if !output.has_meta() {
                return Err(ParserError::ValidationError(ValidationError::EmptyMeta {
                    task: output.name.clone(),
                }));
            }
            if !output.has_task() {
                return Err(ParserError::ValidationError(
                    ValidationError::EmptyOutputTask {
                        task: output.name.clone(),
                    },
                ));
            }
        }

        Ok(())
    }

    /// Trimmed fallback plan name; empty means no fallback
    pub fn fallback_plan(&self) -> &str {
        self.fallback.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.name.clone()).collect()
    }

    pub fn get_task(&self, name: &str) -> Option<&RunTask> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Convert plan back to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(ParserError::YamlError)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        std::fs::write(path.as_ref(), yaml).map_err(ParserError::IoError)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PlanParser;

impl PlanParser {
    pub fn new() -> Self {
        Self
    }

    pub async fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<TaskGroupPlan> {
        let content = fs::read_to_string(path.as_ref())
            .await
            .map_err(ParserError::IoError)?;
        self.parse_string(&content)
    }

    pub fn parse_string(&self, content: &str) -> Result<TaskGroupPlan> {
        TaskGroupPlan::from_yaml(content)
    }
}

impl Default for PlanParser {
    fn default() -> Self {
        Self::new()
    }
}
