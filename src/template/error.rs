// ABOUTME: Error types for template engine operations
// ABOUTME: Defines render failures and the version mismatch class used for fallback decisions

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template syntax error: {0}")]
    SyntaxError(String),

    #[error("Version mismatch: expected '{expected}' found '{found}'")]
    VersionMismatch { expected: String, found: String },

    #[error("System information error: {0}")]
    SystemError(String),

    #[error("Handlebars error: {0}")]
    HandlebarsError(#[from] handlebars::RenderError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, TemplateError>;

/// Raised by the `verify_version` helper from inside a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMismatchError {
    pub expected: String,
    pub found: String,
}

impl fmt::Display for VersionMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version mismatch: expected '{}' found '{}'",
            self.expected, self.found
        )
    }
}

impl StdError for VersionMismatchError {}

impl TemplateError {
    /// Convert a handlebars failure, lifting a version mismatch raised by a
    /// helper into its own variant.
    pub fn from_render(err: handlebars::RenderError) -> Self {
        let mismatch = {
            let mut cause = err.source();
            let mut found = None;
            while let Some(current) = cause {
                if let Some(mismatch) = current.downcast_ref::<VersionMismatchError>() {
                    found = Some(mismatch.clone());
                    break;
                }
                cause = current.source();
            }
            found
        };

        match mismatch {
            Some(VersionMismatchError { expected, found }) => {
                TemplateError::VersionMismatch { expected, found }
            }
            None => TemplateError::HandlebarsError(err),
        }
    }

    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, TemplateError::VersionMismatch { .. })
    }
}

/// Reports whether `err`, or anything in its source chain, belongs to the
/// version mismatch class.
pub fn is_version_mismatch(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(template_err) = e.downcast_ref::<TemplateError>() {
            if template_err.is_version_mismatch() {
                return true;
            }
        }
        if e.downcast_ref::<VersionMismatchError>().is_some() {
            return true;
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("wrapped: {0}")]
    struct Wrapper(#[source] TemplateError);

    #[test]
    fn test_version_mismatch_detected_through_chain() {
        let err = Wrapper(TemplateError::VersionMismatch {
            expected: "1.0.0".to_string(),
            found: "0.9.0".to_string(),
        });
        assert!(is_version_mismatch(&err));
    }

    #[test]
    fn test_other_errors_are_not_version_mismatch() {
        let err = Wrapper(TemplateError::SyntaxError("boom".to_string()));
        assert!(!is_version_mismatch(&err));

        let plain = std::io::Error::new(std::io::ErrorKind::Other, "version mismatch");
        assert!(!is_version_mismatch(&plain));
    }

    #[test]
    fn test_render_error_with_mismatch_cause_is_lifted() {
        let render = handlebars::RenderError::from_error(
            "verify_version",
            VersionMismatchError {
                expected: "2".to_string(),
                found: "1".to_string(),
            },
        );
        let lifted = TemplateError::from_render(render);
        assert!(lifted.is_version_mismatch());
    }
}
