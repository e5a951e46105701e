// ABOUTME: Main application orchestration for the rungroup CLI
// ABOUTME: Coordinates between CLI arguments, configuration, logging and command execution

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands;
use super::{Args, Commands, Config};

pub struct App {
    config: Config,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration. Logs go to stderr so that
    /// stdout carries only the group output.
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let result = match self.config.logging.format.as_str() {
            "compact" => tracing_subscriber::fmt()
                .compact()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
            _ => tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
        };
        result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub async fn run(&mut self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting rungroup v{}", crate::VERSION);
        debug!("Configuration loaded from: {:?}", args.config);

        // Merge any command-specific variables into config
        match &args.command {
            Commands::Run { vars, .. } | Commands::Validate { vars, .. } => {
                let variables = Args::parse_variables(vars)?;
                self.config.merge_variables(variables);
            }
            Commands::List { .. } => {}
        }

        match args.command {
            Commands::Run {
                plan,
                plans_dir,
                output,
                ..
            } => commands::run_plan(plan, plans_dir, output, &self.config).await,

            Commands::Validate {
                plan,
                plans_dir,
                strict,
                ..
            } => commands::validate_plan(plan, plans_dir, strict, &self.config).await,

            Commands::List { plans_dir } => commands::list_plans(plans_dir, &self.config).await,
        }
    }

    /// Create application from command line arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = Config::load(args.config.clone())?;
        Ok(Self::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_app_from_args_with_config_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("rungroup.yaml");
        fs::write(&config_path, "strict_templates: false\nlogging:\n  level: debug\n").unwrap();

        let args = Args::try_parse_from([
            "rungroup",
            "--config",
            config_path.to_str().unwrap(),
            "list",
        ])
        .unwrap();

        let app = App::from_args(&args).unwrap();
        assert!(!app.config().strict_templates);
        assert_eq!(app.config().logging.level, "debug");
    }
}
