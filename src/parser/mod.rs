// ABOUTME: Parser module for YAML task group plans
// ABOUTME: Exports run task and plan structures, plan parsing and validation

pub mod error;
pub mod plan;
pub mod task;
pub mod validation;

pub use error::{ParserError, Result, ValidationError};
pub use plan::{PlanParser, TaskGroupPlan};
pub use task::{RunTask, RunTaskSpec};
pub use validation::{PlanValidator, ValidationReport};
