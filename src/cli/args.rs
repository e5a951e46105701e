// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for rungroup

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rungroup")]
#[command(about = "Run task groups with rollback of created objects and version fallback")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a task group plan
    Run {
        #[arg(help = "Plan file or name of a plan in the plans directory")]
        plan: String,

        #[arg(
            short = 'V',
            long = "var",
            help = "Template variables exposed as Variables.<key> (key=value)"
        )]
        vars: Vec<String>,

        #[arg(long, help = "Directory of plans used for lookups and fallbacks")]
        plans_dir: Option<PathBuf>,

        #[arg(short, long, help = "Write the group output to this file instead of stdout")]
        output: Option<PathBuf>,
    },

    /// Validate a plan without executing it
    Validate {
        #[arg(help = "Plan file or name of a plan in the plans directory")]
        plan: String,

        #[arg(long = "var", help = "Template variables for validation (key=value)")]
        vars: Vec<String>,

        #[arg(long, help = "Directory of plans used for lookups")]
        plans_dir: Option<PathBuf>,

        #[arg(long, help = "Treat warnings as errors")]
        strict: bool,
    },

    /// List the plans found in the plans directory
    List {
        #[arg(long, help = "Directory of plans")]
        plans_dir: Option<PathBuf>,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse variables from key=value format
    pub fn parse_variables(
        vars: &[String],
    ) -> anyhow::Result<std::collections::HashMap<String, String>> {
        let mut variables = std::collections::HashMap::new();

        for var in vars {
            match var.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    variables.insert(key.trim().to_string(), value.to_string());
                }
                _ => {
                    return Err(anyhow::anyhow!(
                        "Invalid variable format '{}'. Expected 'key=value'",
                        var
                    ));
                }
            }
        }

        Ok(variables)
    }
}
