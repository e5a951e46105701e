// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides plan builders, shell based run tasks and temporary test environments

#![allow(dead_code)]

use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;

use rungroup::parser::{RunTask, TaskGroupPlan};
use rungroup::{DefaultExecutorFactory, PlanCatalog};

pub struct TestPlanBuilder {
    plan: TaskGroupPlan,
}

impl TestPlanBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            plan: TaskGroupPlan {
                name: name.to_string(),
                description: Some(format!("Test plan: {}", name)),
                version: "1.0".to_string(),
                fallback: None,
                values: Default::default(),
                tasks: Vec::new(),
                output: None,
            },
        }
    }

    pub fn with_value(mut self, key: &str, value: JsonValue) -> Self {
        self.plan.values.insert(key.to_string(), value);
        self
    }

    pub fn with_fallback(mut self, plan: &str) -> Self {
        self.plan.fallback = Some(plan.to_string());
        self
    }

    pub fn with_task(mut self, name: &str, meta: &str, task: &str) -> Self {
        self.plan.tasks.push(RunTask::new(name, meta, task));
        self
    }

    pub fn with_output(mut self, name: &str, meta: &str, task: &str) -> Self {
        self.plan.output = Some(RunTask::new(name, meta, task));
        self
    }

    /// A put task creating `dir/<object>` whose rollback removes it again and
    /// appends the object name to `dir/rollback.log`
    pub fn add_mkdir_task(self, id: &str, dir: &Path, object: &str) -> Self {
        let meta = format!("id: {}\naction: put\nobjectName: {}\n", id, object);
        let task = format!(
            r#"script: |
  mkdir '{dir}/{object}' && echo '{{"path": "{dir}/{object}"}}'
rollback:
  working_dir: '{dir}'
  script: |
    rmdir "$OBJECT_NAME" && echo "$OBJECT_NAME" >> rollback.log
"#,
            dir = dir.display(),
            object = object,
        );
        self.with_task(id, &meta, &task)
    }

    pub fn add_failing_task(self, id: &str) -> Self {
        self.with_task(
            id,
            &format!("id: {}\naction: put\n", id),
            "script: echo 'disk full' >&2; exit 1\n",
        )
    }

    pub fn build(self) -> TaskGroupPlan {
        self.plan
    }

    pub fn yaml(&self) -> String {
        self.plan.to_yaml().expect("Failed to serialize test plan")
    }

    pub async fn write_to_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        fs::write(path, self.yaml()).await?;
        Ok(())
    }
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::create_dir(temp_dir.path().join("plans")).expect("Failed to create plans dir");
        std::fs::create_dir(temp_dir.path().join("work")).expect("Failed to create work dir");
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.path().join("plans")
    }

    /// Scratch directory the shell tasks create objects in
    pub fn work_dir(&self) -> PathBuf {
        self.path().join("work")
    }

    pub fn rollback_log(&self) -> Vec<String> {
        std::fs::read_to_string(self.work_dir().join("rollback.log"))
            .map(|log| log.lines().map(String::from).collect())
            .unwrap_or_default()
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.path().join(format!("{}_output.json", name))
    }

    pub async fn create_plan_file(&self, builder: &TestPlanBuilder) -> PathBuf {
        let plan_file = self
            .plans_dir()
            .join(format!("{}.yaml", builder.plan.name));
        builder
            .write_to_file(&plan_file)
            .await
            .expect("Failed to write plan file");
        plan_file
    }
}

/// Catalog over the built-in executor with strict templates
pub fn catalog_with(plans: Vec<TaskGroupPlan>) -> Arc<PlanCatalog> {
    let factory = DefaultExecutorFactory::new().expect("Failed to create executor factory");
    let mut catalog = PlanCatalog::new(Arc::new(factory));
    for plan in plans {
        catalog.register(plan);
    }
    Arc::new(catalog)
}
