// ABOUTME: Error types for task group execution
// ABOUTME: Covers configuration, identity, execution, rollback, output and fallback failures

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Invalid run task '{name}': {reason}")]
    InvalidTask { name: String, reason: String },

    #[error("Invalid meta for run task '{name}': {reason}")]
    InvalidMeta { name: String, reason: String },

    #[error("Invalid task specs for run task '{name}': {reason}")]
    InvalidTaskSpec { name: String, reason: String },

    #[error("Multiple tasks having same identity is not allowed in a group run: duplicate id '{id}'")]
    DuplicateIdentity { id: String },

    #[error("Run task '{task_id}' failed: {message}")]
    TaskFailed { task_id: String, message: String },

    #[error("Run task '{task_id}' timed out after {timeout:?}")]
    TaskTimeout { task_id: String, timeout: Duration },

    #[error("Rollback of '{object}' failed: {message}")]
    RollbackFailed { object: String, message: String },

    #[error("Output task '{name}' failed: {message}")]
    OutputFailed { name: String, message: String },

    #[error("Fallback plan not found: '{plan}'")]
    FallbackNotFound { plan: String },

    #[error("Template error: {0}")]
    TemplateError(#[from] crate::template::TemplateError),

    #[error("Parser error: {0}")]
    ParserError(#[from] crate::parser::ParserError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ExecutionError {
    /// Whether this failure belongs to the version mismatch class that makes
    /// a configured fallback plan eligible
    pub fn is_version_mismatch(&self) -> bool {
        crate::template::is_version_mismatch(self)
    }
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
