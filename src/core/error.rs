//! Error handling for charm publishing
//!
//! Errors are grouped the way a publish attempt fails: resolving the charm
//! URL, validating the local branch, talking to the store or the remote
//! branch, and interpreting what the store reported after the push.

use crate::core::state_machine::TransitionError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to work out which charm URL is being published
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("cannot infer charm URL for \"{url}\": no series provided")]
    NoSeries { url: String },

    #[error("charm URL must reference the juju charm store")]
    WrongRepository { url: String },

    #[error("no charm URL provided and cannot infer from current directory (no push location)")]
    NoPushLocation,

    #[error("cannot infer charm URL from branch location: \"{location}\"")]
    UnrecognizedLocation { location: String },

    #[error("invalid charm URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// The local branch is not in a publishable state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("not a charm branch: {}", .dir.display())]
    NotABranch { dir: PathBuf },

    #[error("branch is not clean (git status)")]
    BranchNotClean,

    #[error("metadata: {field}: {reason}")]
    Metadata { field: String, reason: String },

    #[error("charm name in metadata must match name in URL: \"{got}\" != \"{want}\"")]
    NameMismatch { got: String, want: String },

    #[error("cannot obtain local digest: branch has no content")]
    BranchEmpty,
}

/// Main error type for a publish attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transport failure while querying the store or pushing the branch.
    #[error("{message}")]
    Remote { message: String },

    #[error("charm could not be published: {}", .errors.join("; "))]
    PublishFailed { errors: Vec<String> },

    #[error("charm changed but not to local charm digest; publishing race?")]
    Race {
        local: String,
        observed: Option<String>,
    },

    #[error("charm store did not report a change after {attempts} polls ({elapsed:?})")]
    PollTimeout { attempts: u32, elapsed: Duration },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    State(#[from] TransitionError),
}

impl PublishError {
    /// Build a `Remote` error from any displayable cause
    pub fn remote(message: impl std::fmt::Display) -> Self {
        Self::Remote {
            message: message.to_string(),
        }
    }

    /// Whether running the same publish again can succeed without user action.
    ///
    /// A retried run either short-circuits on the store's record or reports
    /// the real outcome, so transport failures and poll timeouts qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote { .. } | Self::PollTimeout { .. })
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Resolution(ResolutionError::NoSeries { .. }) => "NO_SERIES",
            Self::Resolution(ResolutionError::WrongRepository { .. }) => "WRONG_REPOSITORY",
            Self::Resolution(ResolutionError::NoPushLocation) => "NO_PUSH_LOCATION",
            Self::Resolution(ResolutionError::UnrecognizedLocation { .. }) => {
                "UNRECOGNIZED_LOCATION"
            }
            Self::Resolution(ResolutionError::InvalidUrl { .. }) => "INVALID_URL",
            Self::Validation(ValidationError::NotABranch { .. }) => "NOT_A_BRANCH",
            Self::Validation(ValidationError::BranchNotClean) => "BRANCH_NOT_CLEAN",
            Self::Validation(ValidationError::Metadata { .. }) => "METADATA_ERROR",
            Self::Validation(ValidationError::NameMismatch { .. }) => "NAME_MISMATCH",
            Self::Validation(ValidationError::BranchEmpty) => "BRANCH_EMPTY",
            Self::Remote { .. } => "REMOTE_ERROR",
            Self::PublishFailed { .. } => "PUBLISH_FAILED",
            Self::Race { .. } => "PUBLISH_RACE",
            Self::PollTimeout { .. } => "POLL_TIMEOUT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::State(_) => "INVALID_STATE",
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Resolution(ResolutionError::NoSeries { .. }) => {
                vec!["Include the series in the charm URL, e.g. cs:precise/wordpress"]
            }
            Self::Resolution(ResolutionError::WrongRepository { .. }) => {
                vec!["Use a cs: charm URL"]
            }
            Self::Resolution(ResolutionError::NoPushLocation) => vec![
                "Pass the charm URL explicitly",
                "Publish once with an explicit URL so the push location is remembered",
            ],
            Self::Resolution(ResolutionError::UnrecognizedLocation { .. }) => {
                vec!["Pass the charm URL explicitly"]
            }
            Self::Resolution(ResolutionError::InvalidUrl { .. }) => {
                vec!["Check the charm URL syntax: cs:[~user/]series/name"]
            }
            Self::Validation(ValidationError::NotABranch { .. }) => {
                vec!["Run from the charm branch or pass --from <dir>"]
            }
            Self::Validation(ValidationError::BranchNotClean) => {
                vec!["Commit or revert local changes (git status)"]
            }
            Self::Validation(ValidationError::Metadata { .. }) => {
                vec!["Fix metadata.yaml"]
            }
            Self::Validation(ValidationError::NameMismatch { .. }) => vec![
                "Make the name in metadata.yaml match the charm URL",
                "Or publish under the URL matching the metadata name",
            ],
            Self::Validation(ValidationError::BranchEmpty) => {
                vec!["Commit the charm content before publishing"]
            }
            Self::Remote { .. } => vec![
                "Check network connectivity to the charm store and the push location",
                "Run the publish again; it resumes from the store's record",
            ],
            Self::PublishFailed { .. } => vec![
                "Fix the errors reported by the charm store",
                "Commit the fix and publish again",
            ],
            Self::Race { .. } => vec![
                "Another revision was published concurrently",
                "Pull the latest branch, merge, and publish again",
            ],
            Self::PollTimeout { .. } => vec![
                "The branch was pushed; the store may still be processing it",
                "Run the publish again later",
            ],
            Self::Config(_) => vec!["Check .charm-publish.yaml and CHARM_* environment variables"],
            Self::State(_) => vec!["Report this as a bug"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_series_message() {
        let error: PublishError = ResolutionError::NoSeries {
            url: "cs:wordpress".to_string(),
        }
        .into();

        assert_eq!(
            error.to_string(),
            r#"cannot infer charm URL for "cs:wordpress": no series provided"#
        );
        assert_eq!(error.code(), "NO_SERIES");
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_publish_failed_joins_errors() {
        let error = PublishError::PublishFailed {
            errors: vec!["boom".to_string()],
        };
        assert_eq!(error.to_string(), "charm could not be published: boom");

        let error = PublishError::PublishFailed {
            errors: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "charm could not be published: first; second"
        );
    }

    #[test]
    fn test_race_message() {
        let error = PublishError::Race {
            local: "rev-a".to_string(),
            observed: Some("rev-b".to_string()),
        };

        assert_eq!(
            error.to_string(),
            "charm changed but not to local charm digest; publishing race?"
        );
        assert_eq!(error.code(), "PUBLISH_RACE");
    }

    #[test]
    fn test_validation_messages() {
        let error: PublishError = ValidationError::NameMismatch {
            got: "wordpress".to_string(),
            want: "mysql".to_string(),
        }
        .into();
        assert_eq!(
            error.to_string(),
            r#"charm name in metadata must match name in URL: "wordpress" != "mysql""#
        );

        let error: PublishError = ValidationError::Metadata {
            field: "description".to_string(),
            reason: "expected string, got nothing".to_string(),
        }
        .into();
        assert_eq!(
            error.to_string(),
            "metadata: description: expected string, got nothing"
        );

        let error: PublishError = ValidationError::NotABranch {
            dir: PathBuf::from("/tmp/nowhere"),
        }
        .into();
        assert_eq!(error.to_string(), "not a charm branch: /tmp/nowhere");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(PublishError::remote("connection refused").is_retryable());
        assert!(
            PublishError::PollTimeout {
                attempts: 3,
                elapsed: Duration::from_secs(1),
            }
            .is_retryable()
        );
        assert!(!PublishError::Race {
            local: "a".to_string(),
            observed: None,
        }
        .is_retryable());
    }

    #[test]
    fn test_every_error_has_suggestions() {
        let errors = vec![
            PublishError::from(ResolutionError::NoPushLocation),
            PublishError::from(ResolutionError::UnrecognizedLocation {
                location: "/tmp/foo".to_string(),
            }),
            PublishError::from(ValidationError::BranchNotClean),
            PublishError::from(ValidationError::BranchEmpty),
            PublishError::remote("down"),
            PublishError::Config("bad".to_string()),
        ];

        for error in errors {
            assert!(!error.suggested_actions().is_empty(), "{}", error.code());
        }
    }
}
