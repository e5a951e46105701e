// ABOUTME: Plan validation ahead of execution
// ABOUTME: Checks template syntax, renders meta blocks against plan values and detects identity collisions

use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

use super::error::ValidationError;
use super::plan::TaskGroupPlan;
use super::task::RunTask;
use crate::template::{TemplateEngine, TemplateError};

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
    pub is_valid: bool,
}

/// Validates a plan without executing anything. Meta blocks are rendered
/// against the plan's own values merged with any supplied extras, so
/// identities depending on earlier task results cannot be resolved here.
pub struct PlanValidator {
    strict_mode: bool,
    engine: TemplateEngine,
    extra_values: Map<String, JsonValue>,
}

impl PlanValidator {
    pub fn new() -> Self {
        Self {
            strict_mode: false,
            engine: TemplateEngine::default(),
            extra_values: Map::new(),
        }
    }

    /// Treat warnings as errors when computing `is_valid`
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn with_engine(mut self, engine: TemplateEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Context entries layered over the plan values while rendering
    pub fn with_values(mut self, values: Map<String, JsonValue>) -> Self {
        self.extra_values = values;
        self
    }

    pub fn validate(&self, plan: &TaskGroupPlan) -> ValidationReport {
        let mut report = ValidationReport::new();

        self.validate_templates(plan, &mut report);
        self.validate_identities(plan, &mut report);

        if plan.tasks.is_empty() {
            report
                .warnings
                .push("Plan has no run tasks; only the output task will run".to_string());
        }

        if plan.fallback_plan() == plan.name {
            report
                .warnings
                .push(format!("Plan '{}' names itself as its fallback", plan.name));
        }

        report.is_valid =
            report.errors.is_empty() && !(self.strict_mode && report.has_warnings());
        report
    }

    fn all_tasks<'a>(&self, plan: &'a TaskGroupPlan) -> impl Iterator<Item = &'a RunTask> {
        plan.tasks.iter().chain(plan.output.iter())
    }

    fn validate_templates(&self, plan: &TaskGroupPlan, report: &mut ValidationReport) {
        for task in self.all_tasks(plan) {
            for (block, template) in [("meta", &task.spec.meta), ("task", &task.spec.task)] {
                if let Err(e) = self.engine.validate_template(template) {
                    report.errors.push(ValidationError::InvalidTemplate {
                        field: format!("{}.spec.{}", task.name, block),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    fn render_context(&self, plan: &TaskGroupPlan) -> JsonValue {
        let mut context = plan.values.clone();
        for (key, value) in &self.extra_values {
            context.insert(key.clone(), value.clone());
        }
        JsonValue::Object(context)
    }

    /// Render each run task's meta block and report identities shared by
    /// more than one task, compared case-insensitively
    fn validate_identities(&self, plan: &TaskGroupPlan, report: &mut ValidationReport) {
        let context = self.render_context(plan);
        let mut seen: HashMap<String, (String, String)> = HashMap::new();

        for task in &plan.tasks {
            let meta: JsonValue = match self.engine.render_yaml(&task.spec.meta, &context) {
                Ok(meta) => meta,
                Err(TemplateError::VersionMismatch { expected, found }) => {
                    report.warnings.push(format!(
                        "Task '{}' fails version verification (expected {}, found {}); \
                         the plan would fall back to '{}'",
                        task.name,
                        expected,
                        found,
                        plan.fallback_plan()
                    ));
                    continue;
                }
                Err(e) => {
                    report.warnings.push(format!(
                        "Meta of task '{}' cannot be rendered before execution: {}",
                        task.name, e
                    ));
                    continue;
                }
            };

            let id = meta
                .get("id")
                .and_then(JsonValue::as_str)
                .map(str::trim)
                .unwrap_or("");
            if id.is_empty() {
                report.warnings.push(format!("Task '{}' renders no id", task.name));
                continue;
            }

            match seen.get(&id.to_lowercase()) {
                Some((first_task, first_id)) => {
                    report.errors.push(ValidationError::DuplicateIdentity {
                        id: if first_id == id {
                            id.to_string()
                        } else {
                            format!("{}/{}", first_id, id)
                        },
                        first: first_task.clone(),
                        second: task.name.clone(),
                    });
                }
                None => {
                    seen.insert(id.to_lowercase(), (task.name.clone(), id.to_string()));
                }
            }
        }
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl Default for PlanValidator {
    fn default() -> Self {
        Self::new()
    }
}
