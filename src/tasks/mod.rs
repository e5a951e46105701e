// ABOUTME: Built-in run task executor for rungroup task groups
// ABOUTME: Meta and body models, process execution and command based rollbacks

pub mod command;
pub mod executor;
pub mod meta;
pub mod rollback;

pub use command::{CommandOutput, CommandRunner};
pub use executor::{DefaultExecutorFactory, RunTaskExecutor};
pub use meta::{CommandSpec, MetaTask, RetrySpec, TaskAction, TaskBody};
pub use rollback::CommandRollback;
