// ABOUTME: Error types for task group plan parsing and validation
// ABOUTME: Defines specific error types for parser module operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Failed to read plan file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Run task '{task}' has an empty meta block")]
    EmptyMeta { task: String },

    #[error("Output task '{task}' has an empty task block")]
    EmptyOutputTask { task: String },

    #[error("Invalid template syntax in '{field}': {error}")]
    InvalidTemplate { field: String, error: String },

    #[error("Duplicate task identity '{id}' in tasks '{first}' and '{second}'")]
    DuplicateIdentity {
        id: String,
        first: String,
        second: String,
    },

    #[error("Empty plan: no run tasks and no output task defined")]
    EmptyPlan,
}

pub type Result<T> = std::result::Result<T, ParserError>;
