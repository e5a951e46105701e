// ABOUTME: Configuration management for the rungroup application
// ABOUTME: Handles loading and merging configuration from files and environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory searched for plans by name and for fallback plans
    #[serde(default)]
    pub plans_dir: Option<PathBuf>,

    /// Fail executor construction on unresolved template references
    #[serde(default = "default_strict_templates")]
    pub strict_templates: bool,

    /// Variables exposed to templates as `Variables.<key>`
    #[serde(default)]
    pub template_vars: HashMap<String, String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_strict_templates() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plans_dir: None,
            strict_templates: default_strict_templates(),
            template_vars: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file(),
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config {}", config_path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Invalid config {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.merge_env()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> PathBuf {
        let possible_paths = vec![
            PathBuf::from("rungroup.yaml"),
            PathBuf::from("rungroup.yml"),
            PathBuf::from(".rungroup.yaml"),
            PathBuf::from(".rungroup.yml"),
        ];

        for path in possible_paths {
            if path.exists() {
                return path;
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".rungroup").join("config.yaml");
            if home_config.exists() {
                return home_config;
            }
        }

        // Default path (may not exist)
        PathBuf::from("rungroup.yaml")
    }

    fn merge_env(&mut self) -> Result<()> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply `RUNGROUP_*` overrides read through `lookup`
    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("RUNGROUP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("RUNGROUP_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(dir) = lookup("RUNGROUP_PLANS_DIR") {
            self.plans_dir = Some(PathBuf::from(dir));
        }
        if let Some(strict) = lookup("RUNGROUP_STRICT_TEMPLATES") {
            self.strict_templates = strict.trim().parse().with_context(|| {
                format!(
                    "RUNGROUP_STRICT_TEMPLATES must be true or false, got '{}'",
                    strict
                )
            })?;
        }

        Ok(())
    }

    /// Merge additional variables into template variables
    pub fn merge_variables(&mut self, vars: HashMap<String, String>) {
        self.template_vars.extend(vars);
    }
}
