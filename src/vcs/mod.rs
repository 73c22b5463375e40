//! Version control: the local charm branch

pub mod command_executor;
pub mod git_branch;

pub use command_executor::{CommandError, SafeCommandExecutor};
pub use git_branch::{DEFAULT_GIT_TIMEOUT, GitBranch};
