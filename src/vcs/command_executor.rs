//! SafeCommandExecutor: whitelisted, argument-vector process execution
//!
//! - **Whitelist-based validation**: only version-control commands can run
//! - **Injection prevention**: arguments are passed as a vector, never through a shell
//! - **Working directory validation**: checked once at construction
//! - **Timeout control**: a hung process is killed when the timeout expires
//!
//! # Example
//!
//! ```rust,no_run
//! use charm_publisher::vcs::SafeCommandExecutor;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), charm_publisher::vcs::CommandError> {
//! let mut executor = SafeCommandExecutor::new(std::env::temp_dir())?;
//! executor.set_timeout(Duration::from_secs(30));
//!
//! let output = executor.execute("git", &["--version"]).await?;
//! println!("{}", String::from_utf8_lossy(&output.stdout));
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Commands the executor is allowed to run
const ALLOWED_COMMANDS: &[&str] = &["git"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Binary not found, permission denied, ...
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Command timeout after {0:?}")]
    Timeout(Duration),
}

impl CommandError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::CommandNotAllowed(_) => "COMMAND_NOT_ALLOWED",
            Self::InvalidWorkingDirectory(_) => "INVALID_WORKING_DIRECTORY",
            Self::ExecutionFailed(_) => "EXECUTION_FAILED",
            Self::Timeout(_) => "COMMAND_TIMEOUT",
        }
    }

    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::CommandNotAllowed(_) => vec!["Only git commands can be executed"],
            Self::InvalidWorkingDirectory(_) => vec!["Check the --from directory"],
            Self::ExecutionFailed(_) => vec!["Check that git is installed and on PATH"],
            Self::Timeout(_) => vec![
                "Check network connectivity to the push location",
                "Run the publish again",
            ],
        }
    }
}

/// Safe command executor with security controls
#[derive(Debug, Clone)]
pub struct SafeCommandExecutor {
    working_dir: PathBuf,
    timeout: Option<Duration>,
    env: Vec<(String, String)>,
}

impl SafeCommandExecutor {
    /// Create a new SafeCommandExecutor with working directory validation.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            timeout: None,
            env: Vec::new(),
        })
    }

    /// Set command execution timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Set an environment variable for every executed command
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.push((key.into(), value.into()));
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Execute a command with whitelist validation.
    ///
    /// A non-zero exit status is not an error here; callers inspect
    /// `Output::status`.
    ///
    /// # Errors
    ///
    /// - `CommandError::CommandNotAllowed` - Command not in whitelist
    /// - `CommandError::ExecutionFailed` - Binary not found or execution error
    /// - `CommandError::Timeout` - The process outlived the configured timeout
    pub async fn execute(&self, command: &str, args: &[&str]) -> Result<Output, CommandError> {
        if !ALLOWED_COMMANDS.contains(&command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }

        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true);

        tracing::trace!(command, ?args, dir = %self.working_dir.display(), "executing");

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, cmd.output())
                .await
                .map_err(|_| CommandError::Timeout(timeout))?,
            None => cmd.output().await,
        };

        output.map_err(|e| CommandError::ExecutionFailed(e.to_string()))
    }
}
