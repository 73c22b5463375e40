//! Core traits and types for charm publishing
//!
//! The publisher talks to two collaborators: the local branch holding the
//! charm source ([`DigestSource`]) and the charm store ([`StoreClient`]).
//! Both are traits so the orchestration can run against real git and HTTP
//! or against in-memory fakes.

use crate::core::charm_url::CharmUrl;
use crate::core::error::PublishError;
use crate::validation::CharmMetadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Content identity of a source snapshot (the VCS revision id)
pub type Digest = String;

// ============================================================================
// Store events
// ============================================================================

/// What the store knows about a charm or a charm snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Published,
    PublishError,
    NotFound,
}

/// Result of one store query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<u32>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl EventRecord {
    pub fn published(digest: impl Into<Digest>, revision: u32) -> Self {
        Self {
            kind: EventKind::Published,
            digest: Some(digest.into()),
            revision: Some(revision),
            errors: Vec::new(),
        }
    }

    pub fn publish_error(digest: impl Into<Digest>, errors: Vec<String>) -> Self {
        Self {
            kind: EventKind::PublishError,
            digest: Some(digest.into()),
            revision: None,
            errors,
        }
    }

    pub fn not_found() -> Self {
        Self {
            kind: EventKind::NotFound,
            digest: None,
            revision: None,
            errors: Vec::new(),
        }
    }

    /// Whether this record is about the given snapshot
    pub fn is_for(&self, digest: &str) -> bool {
        self.digest.as_deref() == Some(digest)
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Local source tree of the charm being published
#[async_trait]
pub trait DigestSource: Send + Sync {
    /// Revision id of the committed tree.
    ///
    /// Fails with `ValidationError::BranchEmpty` when nothing is committed.
    async fn local_digest(&self) -> Result<Digest, PublishError>;

    /// Whether the working tree matches the last commit
    async fn is_clean(&self) -> Result<bool, PublishError>;

    /// Parse and validate the charm metadata
    async fn load_metadata(&self) -> Result<CharmMetadata, PublishError>;

    /// Push location remembered from a previous push, if any
    async fn remembered_push_location(&self) -> Result<Option<String>, PublishError>;

    /// Replicate the branch to `location`.
    ///
    /// Transport failures are reported as `PublishError::Remote` and are not
    /// retried.
    async fn push(&self, location: &str, remember: bool) -> Result<(), PublishError>;
}

/// Query side of the charm store
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// One round trip to the store's event endpoint.
    ///
    /// With `digest` the answer is for that exact snapshot, without it the
    /// answer is for the current tip of `url`.
    async fn query_event(
        &self,
        url: &CharmUrl,
        digest: Option<&str>,
    ) -> Result<EventRecord, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_record_constructors() {
        let published = EventRecord::published("rev-1", 42);
        assert_eq!(published.kind, EventKind::Published);
        assert_eq!(published.revision, Some(42));
        assert!(published.is_for("rev-1"));
        assert!(!published.is_for("rev-2"));

        let failed = EventRecord::publish_error("rev-1", vec!["boom".to_string()]);
        assert_eq!(failed.kind, EventKind::PublishError);
        assert_eq!(failed.errors, vec!["boom".to_string()]);

        let missing = EventRecord::not_found();
        assert!(missing.digest.is_none());
        assert!(missing.revision.is_none());
        assert!(!missing.is_for("rev-1"));
    }

    #[test]
    fn test_event_kind_serialization() {
        let json = serde_json::to_string(&EventKind::PublishError).unwrap();
        assert_eq!(json, r#""publish-error""#);

        let kind: EventKind = serde_json::from_str(r#""published""#).unwrap();
        assert_eq!(kind, EventKind::Published);
    }
}
