// ABOUTME: Template engine module for rendering run task specifications
// ABOUTME: Provides handlebars rendering, helpers and version mismatch classification

pub mod engine;
pub mod error;
pub mod helpers;

pub use engine::TemplateEngine;
pub use error::{is_version_mismatch, Result, TemplateError, VersionMismatchError};
