// ABOUTME: Command implementations for the rungroup CLI
// ABOUTME: Handles execution of run, validate and list commands

use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::config::Config;
use crate::engine::{PlanCatalog, Values};
use crate::parser::{PlanParser, PlanValidator, TaskGroupPlan};
use crate::tasks::DefaultExecutorFactory;
use crate::template::TemplateEngine;

/// Build the catalog from the plans directory given on the command line,
/// falling back to the configured one
fn build_catalog(plans_dir: Option<PathBuf>, config: &Config) -> Result<PlanCatalog> {
    let factory = DefaultExecutorFactory::with_strict_mode(config.strict_templates)
        .context("Failed to create task executor factory")?;
    let mut catalog = PlanCatalog::new(Arc::new(factory));

    if let Some(dir) = plans_dir.or_else(|| config.plans_dir.clone()) {
        if dir.is_dir() {
            catalog
                .load_dir(&dir)
                .with_context(|| format!("Failed to load plans from {}", dir.display()))?;
        } else {
            warn!("Plans directory {} does not exist", dir.display());
        }
    }

    Ok(catalog)
}

/// A plan argument is either a YAML file, registered into the catalog, or
/// the name of a catalog plan
async fn resolve_plan(plan: &str, catalog: &mut PlanCatalog) -> Result<TaskGroupPlan> {
    let path = Path::new(plan);
    if path.is_file() {
        let parsed = PlanParser::new()
            .parse_file(path)
            .await
            .with_context(|| format!("Failed to parse plan {}", path.display()))?;
        if catalog.register(parsed.clone()) {
            info!("Loaded plan '{}' from {}", parsed.name, path.display());
        }
        return Ok(parsed);
    }

    catalog.get(plan).cloned().ok_or_else(|| {
        anyhow!(
            "Plan '{}' is neither a file nor a known plan (known: {})",
            plan,
            catalog.names().join(", ")
        )
    })
}

fn initial_values(config: &Config) -> Values {
    let mut values = Values::new();
    if !config.template_vars.is_empty() {
        values.merge_variables(&config.template_vars);
    }
    values
}

/// Run a plan and write its output bytes
pub async fn run_plan(
    plan: String,
    plans_dir: Option<PathBuf>,
    output: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let mut catalog = build_catalog(plans_dir, config)?;
    let resolved = resolve_plan(&plan, &mut catalog).await?;
    let catalog = Arc::new(catalog);

    info!(
        "Running plan '{}' ({} task(s))",
        resolved.name,
        resolved.tasks.len()
    );

    let mut values = initial_values(config);
    let bytes = catalog
        .run_plan(&resolved.name, &mut values)
        .await
        .map_err(|e| anyhow!("Plan '{}' failed: {}", resolved.name, e))?;

    match output {
        Some(path) => {
            std::fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write output file '{}'", path.display()))?;
            info!("Output written to: {}", path.display());
        }
        None if !bytes.is_empty() => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            writeln!(stdout)?;
        }
        None => {}
    }

    info!("Plan '{}' completed", resolved.name);
    Ok(())
}

/// Validate a plan file or named plan
pub async fn validate_plan(
    plan: String,
    plans_dir: Option<PathBuf>,
    strict: bool,
    config: &Config,
) -> Result<()> {
    let mut catalog = build_catalog(plans_dir, config)?;
    let resolved = resolve_plan(&plan, &mut catalog).await?;

    let engine = TemplateEngine::with_strict_mode(config.strict_templates)?;
    let report = PlanValidator::new()
        .with_engine(engine)
        .with_strict_mode(strict)
        .with_values(initial_values(config).as_map().clone())
        .validate(&resolved);

    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
    for error in &report.errors {
        println!("  error: {}", error);
    }

    if !report.is_valid {
        return Err(anyhow!(
            "Plan '{}' is invalid: {} error(s), {} warning(s)",
            resolved.name,
            report.errors.len(),
            report.warnings.len()
        ));
    }

    println!("✓ Plan '{}' is valid", resolved.name);
    println!("  Tasks: {}", resolved.tasks.len());
    println!(
        "  Output task: {}",
        resolved.output.as_ref().map(|t| t.name.as_str()).unwrap_or("none")
    );
    if !resolved.fallback_plan().is_empty() {
        let known = if catalog.contains(resolved.fallback_plan()) {
            "found"
        } else {
            "not found"
        };
        println!("  Fallback: {} ({})", resolved.fallback_plan(), known);
    }

    info!("Plan validation completed successfully");
    Ok(())
}

/// Print the plans available in the plans directory
pub async fn list_plans(plans_dir: Option<PathBuf>, config: &Config) -> Result<()> {
    let catalog = build_catalog(plans_dir, config)?;

    if catalog.is_empty() {
        println!("No plans found");
        return Ok(());
    }

    for name in catalog.names() {
        if let Some(plan) = catalog.get(&name) {
            let description = plan.description.as_deref().unwrap_or("");
            println!("{}\t{} task(s)\t{}", name, plan.tasks.len(), description);
        }
    }

    Ok(())
}
