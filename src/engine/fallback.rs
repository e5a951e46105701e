// ABOUTME: Catalog of named task group plans used to run plans and serve fallbacks
// ABOUTME: Loads plan YAML files from a directory and runs a named plan on a version mismatch

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::context::Values;
use super::error::{ExecutionError, Result};
use super::executor::{ExecutorFactory, FallbackRunner};
use super::runner::TaskGroupRunner;
use crate::parser::TaskGroupPlan;

/// Named plans sharing one executor factory
pub struct PlanCatalog {
    factory: Arc<dyn ExecutorFactory>,
    plans: HashMap<String, TaskGroupPlan>,
}

impl PlanCatalog {
    pub fn new(factory: Arc<dyn ExecutorFactory>) -> Self {
        Self {
            factory,
            plans: HashMap::new(),
        }
    }

    /// Register a plan under its name, replacing a different plan of the
    /// same name. Returns false when an identical plan is already registered.
    pub fn register(&mut self, plan: TaskGroupPlan) -> bool {
        if self.plans.get(&plan.name) == Some(&plan) {
            debug!("Plan '{}' is already registered", plan.name);
            return false;
        }

        debug!("Registering plan '{}'", plan.name);
        if let Some(previous) = self.plans.insert(plan.name.clone(), plan) {
            warn!("Plan '{}' was registered twice; keeping the latest", previous.name);
        }
        true
    }

    /// Load every `.yaml`/`.yml` plan below `dir`. Returns the number loaded.
    pub fn load_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let mut loaded = 0;
        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.map_err(|e| ExecutionError::IoError(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let is_yaml = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
                .unwrap_or(false);
            if !is_yaml {
                continue;
            }

            let plan = TaskGroupPlan::from_file(entry.path())?;
            self.register(plan);
            loaded += 1;
        }

        info!("Loaded {} plan(s) from {}", loaded, dir.as_ref().display());
        Ok(loaded)
    }

    pub fn get(&self, name: &str) -> Option<&TaskGroupPlan> {
        self.plans.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plans.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plans.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Seed plan values missing from the context and build a runner for the plan
    fn prepare(&self, name: &str, values: &mut Values) -> Result<TaskGroupRunner> {
        let plan = self
            .plans
            .get(name)
            .ok_or_else(|| ExecutionError::FallbackNotFound {
                plan: name.to_string(),
            })?;

        values.merge_missing(&plan.values);
        TaskGroupRunner::from_plan(plan, self.factory.clone())
    }

    /// Run a named plan with this catalog serving its fallback
    pub async fn run_plan(self: &Arc<Self>, name: &str, values: &mut Values) -> Result<Vec<u8>> {
        info!("Running plan '{}'", name);
        let runner = self
            .prepare(name, values)?
            .with_fallback_runner(self.clone());
        runner.run(values).await
    }
}

#[async_trait]
impl FallbackRunner for PlanCatalog {
    /// Fallback runs are one shot: the fallback plan's own fallback is ignored
    async fn run_fallback(&self, plan: &str, values: &mut Values) -> Result<Vec<u8>> {
        let mut runner = self.prepare(plan, values)?;
        if !runner.fallback_plan().is_empty() {
            debug!(
                "Ignoring fallback '{}' of fallback plan '{}'",
                runner.fallback_plan(),
                plan
            );
            runner.set_fallback("");
        }
        runner.run(values).await
    }
}

impl std::fmt::Debug for PlanCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanCatalog")
            .field("plans", &self.names())
            .finish()
    }
}
