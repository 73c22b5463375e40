//! Git working tree as the charm source

use crate::core::error::{PublishError, ValidationError};
use crate::core::traits::{Digest, DigestSource};
use crate::validation::CharmMetadata;
use crate::vcs::command_executor::{CommandError, SafeCommandExecutor};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

/// Git config key holding the last push location
pub const PUSH_LOCATION_KEY: &str = "charm.pushlocation";

/// Branch name the store's pipeline watches at the push location
pub const PUSH_REFSPEC: &str = "HEAD:refs/heads/master";

pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// A charm branch backed by a git working tree
#[derive(Debug, Clone)]
pub struct GitBranch {
    root: PathBuf,
    executor: SafeCommandExecutor,
}

impl GitBranch {
    /// Open the working tree containing `dir`.
    ///
    /// Fails with `ValidationError::NotABranch` when `dir` does not exist or
    /// is not inside a git working tree.
    pub async fn open(dir: &Path, timeout: Duration) -> Result<Self, PublishError> {
        let not_a_branch = || ValidationError::NotABranch {
            dir: dir.to_path_buf(),
        };

        let mut executor = SafeCommandExecutor::new(dir).map_err(|_| not_a_branch())?;
        executor.set_timeout(timeout);
        executor.set_env("GIT_TERMINAL_PROMPT", "0");

        let output = run(&executor, &["rev-parse", "--show-toplevel"]).await?;
        if !output.status.success() {
            return Err(not_a_branch().into());
        }
        let root = PathBuf::from(stdout_line(&output));
        tracing::debug!(root = %root.display(), "opened charm branch");

        let mut executor = SafeCommandExecutor::new(&root).map_err(|_| not_a_branch())?;
        executor.set_timeout(timeout);
        executor.set_env("GIT_TERMINAL_PROMPT", "0");

        Ok(Self { root, executor })
    }

    /// Top-level directory of the working tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn git(&self, args: &[&str]) -> Result<Output, PublishError> {
        run(&self.executor, args).await
    }
}

async fn run(executor: &SafeCommandExecutor, args: &[&str]) -> Result<Output, PublishError> {
    executor.execute("git", args).await.map_err(|e| match e {
        CommandError::Timeout(after) => {
            PublishError::remote(format!("git {} timed out after {:?}", args.join(" "), after))
        }
        other => PublishError::remote(format!("cannot run git: {}", other)),
    })
}

fn stdout_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn stderr_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[async_trait]
impl DigestSource for GitBranch {
    async fn local_digest(&self) -> Result<Digest, PublishError> {
        let output = self.git(&["rev-parse", "--verify", "--quiet", "HEAD"]).await?;
        let digest = stdout_line(&output);
        if !output.status.success() || digest.is_empty() {
            return Err(ValidationError::BranchEmpty.into());
        }
        Ok(digest)
    }

    async fn is_clean(&self) -> Result<bool, PublishError> {
        let output = self.git(&["status", "--porcelain"]).await?;
        if !output.status.success() {
            return Err(PublishError::remote(format!(
                "git status failed: {}",
                stderr_line(&output)
            )));
        }
        Ok(output.stdout.iter().all(u8::is_ascii_whitespace))
    }

    async fn load_metadata(&self) -> Result<CharmMetadata, PublishError> {
        Ok(CharmMetadata::load(&self.root).await?)
    }

    async fn remembered_push_location(&self) -> Result<Option<String>, PublishError> {
        let output = self.git(&["config", "--get", PUSH_LOCATION_KEY]).await?;
        match output.status.code() {
            Some(0) => {
                let location = stdout_line(&output);
                Ok((!location.is_empty()).then_some(location))
            }
            // git config exits 1 when the key is unset
            Some(1) => Ok(None),
            _ => Err(PublishError::remote(format!(
                "cannot read push location: {}",
                stderr_line(&output)
            ))),
        }
    }

    async fn push(&self, location: &str, remember: bool) -> Result<(), PublishError> {
        let output = self.git(&["push", "--quiet", location, PUSH_REFSPEC]).await?;
        if !output.status.success() {
            return Err(PublishError::remote(format!(
                "cannot push branch to {}: {}",
                location,
                stderr_line(&output)
            )));
        }

        if remember {
            let output = self.git(&["config", PUSH_LOCATION_KEY, location]).await?;
            if !output.status.success() {
                return Err(PublishError::remote(format!(
                    "cannot remember push location: {}",
                    stderr_line(&output)
                )));
            }
        }

        tracing::info!(%location, "branch pushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    const METADATA: &str = "name: wordpress\nsummary: Some summary\ndescription: Some description.\n";

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(["-c", "user.name=Charm Tester", "-c", "user.email=tester@example.com"])
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?}: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    fn init_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "--quiet"]);
        dir
    }

    fn commit_charm(dir: &Path) -> String {
        std::fs::write(dir.join("metadata.yaml"), METADATA).unwrap();
        git(dir, &["add", "metadata.yaml"]);
        git(dir, &["commit", "--quiet", "-m", "Add metadata"]);
        git(dir, &["rev-parse", "HEAD"])
    }

    async fn open(dir: &Path) -> GitBranch {
        GitBranch::open(dir, DEFAULT_GIT_TIMEOUT).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_missing_directory() {
        let error = GitBranch::open(Path::new("/nonexistent/charm"), DEFAULT_GIT_TIMEOUT)
            .await
            .unwrap_err();

        assert_eq!(error.code(), "NOT_A_BRANCH");
    }

    #[tokio::test]
    async fn test_open_plain_directory() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();

        let error = GitBranch::open(dir.path(), DEFAULT_GIT_TIMEOUT)
            .await
            .unwrap_err();

        assert_eq!(
            error,
            PublishError::from(ValidationError::NotABranch {
                dir: dir.path().to_path_buf()
            })
        );
    }

    #[tokio::test]
    async fn test_empty_branch_has_no_digest() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        let branch = open(dir.path()).await;

        let error = branch.local_digest().await.unwrap_err();

        assert_eq!(error, PublishError::from(ValidationError::BranchEmpty));
        assert!(branch.is_clean().await.unwrap());
    }

    #[tokio::test]
    async fn test_digest_and_metadata() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        let head = commit_charm(dir.path());
        let branch = open(dir.path()).await;

        assert_eq!(branch.local_digest().await.unwrap(), head);
        assert_eq!(branch.load_metadata().await.unwrap().name, "wordpress");
        assert!(branch.is_clean().await.unwrap());
    }

    #[tokio::test]
    async fn test_open_from_subdirectory() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        commit_charm(dir.path());
        let hooks = dir.path().join("hooks");
        std::fs::create_dir(&hooks).unwrap();

        let branch = open(&hooks).await;

        assert_eq!(branch.load_metadata().await.unwrap().name, "wordpress");
    }

    #[tokio::test]
    async fn test_dirty_tree() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        commit_charm(dir.path());
        let branch = open(dir.path()).await;

        std::fs::write(dir.path().join("metadata.yaml"), "name: changed\n").unwrap();
        assert!(!branch.is_clean().await.unwrap());

        git(dir.path(), &["checkout", "--", "metadata.yaml"]);
        std::fs::write(dir.path().join("README"), "untracked").unwrap();
        assert!(!branch.is_clean().await.unwrap());
    }

    #[tokio::test]
    async fn test_push_remembers_location() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        let head = commit_charm(dir.path());
        let target = TempDir::new().unwrap();
        git(target.path(), &["init", "--quiet", "--bare"]);
        let location = target.path().to_string_lossy().to_string();
        let branch = open(dir.path()).await;

        assert_eq!(branch.remembered_push_location().await.unwrap(), None);

        branch.push(&location, true).await.unwrap();

        assert_eq!(
            branch.remembered_push_location().await.unwrap(),
            Some(location)
        );
        assert_eq!(git(target.path(), &["rev-parse", "refs/heads/master"]), head);
    }

    #[tokio::test]
    async fn test_push_without_remembering() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        commit_charm(dir.path());
        let target = TempDir::new().unwrap();
        git(target.path(), &["init", "--quiet", "--bare"]);
        let branch = open(dir.path()).await;

        branch
            .push(&target.path().to_string_lossy(), false)
            .await
            .unwrap();

        assert_eq!(branch.remembered_push_location().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_push_failure_is_remote_error() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        commit_charm(dir.path());
        let branch = open(dir.path()).await;

        let error = branch.push("/nonexistent/push/target", true).await.unwrap_err();

        assert_eq!(error.code(), "REMOTE_ERROR");
        assert!(
            error
                .to_string()
                .starts_with("cannot push branch to /nonexistent/push/target")
        );
        assert_eq!(branch.remembered_push_location().await.unwrap(), None);
    }
}
