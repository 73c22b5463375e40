//! HTTP client for the charm store's event endpoint
//!
//! `GET <base>/charm-event?charms=<url>[@<digest>]` answers with a JSON
//! object keyed by charm URL:
//!
//! ```json
//! {"cs:precise/wordpress": {"kind": "published", "digest": "...", "revision": 42}}
//! ```

use crate::core::charm_url::CharmUrl;
use crate::core::config::CharmPublishConfig;
use crate::core::error::PublishError;
use crate::core::traits::{EventKind, EventRecord, StoreClient};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const EVENT_PATH: &str = "charm-event";
const NOT_FOUND_ERROR: &str = "entry not found";

/// One entry of the event response as sent by the store
#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    revision: Option<u32>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

impl WireEvent {
    fn into_record(self, key: &str) -> Result<EventRecord, PublishError> {
        for warning in &self.warnings {
            tracing::warn!(charm = key, %warning, "charm store warning");
        }

        match self.kind.as_str() {
            "" => {
                let failures: Vec<&String> = self
                    .errors
                    .iter()
                    .filter(|e| e.as_str() != NOT_FOUND_ERROR)
                    .collect();
                if !failures.is_empty() {
                    return Err(PublishError::remote(format!(
                        "charm store error for {}: {}",
                        key,
                        failures
                            .iter()
                            .map(|e| e.as_str())
                            .collect::<Vec<_>>()
                            .join("; ")
                    )));
                }
                Ok(EventRecord::not_found())
            }
            "published" => {
                let digest = self.require_digest(key)?;
                // Tip records for other snapshots may omit the revision.
                Ok(EventRecord {
                    kind: EventKind::Published,
                    digest: Some(digest),
                    revision: self.revision,
                    errors: Vec::new(),
                })
            }
            "publish-error" => {
                let digest = self.require_digest(key)?;
                if self.errors.is_empty() {
                    return Err(PublishError::remote(format!(
                        "charm store reported a publish error for {} without details",
                        key
                    )));
                }
                Ok(EventRecord::publish_error(digest, self.errors))
            }
            other => Err(PublishError::remote(format!(
                "charm store returned unknown event kind {:?} for {}",
                other, key
            ))),
        }
    }

    fn require_digest(&self, key: &str) -> Result<String, PublishError> {
        self.digest.clone().ok_or_else(|| {
            PublishError::remote(format!(
                "charm store returned a {} event without a digest for {}",
                self.kind, key
            ))
        })
    }
}

/// Charm store client over HTTP
#[derive(Debug, Clone)]
pub struct CharmStoreClient {
    client: reqwest::Client,
    base_url: String,
}

impl CharmStoreClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("charm-publish/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PublishError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &CharmPublishConfig) -> Result<Self, PublishError> {
        Self::new(config.store_url(), config.store_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl StoreClient for CharmStoreClient {
    async fn query_event(
        &self,
        url: &CharmUrl,
        digest: Option<&str>,
    ) -> Result<EventRecord, PublishError> {
        let charm = url.without_revision().to_string();
        let query = match digest {
            Some(digest) => format!("{}@{}", charm, digest),
            None => charm.clone(),
        };
        let endpoint = format!("{}/{}", self.base_url, EVENT_PATH);
        tracing::debug!(%endpoint, charms = %query, "querying charm store");

        let response = self
            .client
            .get(&endpoint)
            .query(&[("charms", query.as_str())])
            .send()
            .await
            .map_err(|e| PublishError::remote(format!("cannot query charm store: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::remote(format!(
                "charm store returned HTTP {} for {}",
                status, query
            )));
        }

        let mut events: HashMap<String, WireEvent> = response.json().await.map_err(|e| {
            PublishError::remote(format!("cannot decode charm store response: {}", e))
        })?;

        // The store keys answers by charm URL; accept the full query key too.
        let event = events
            .remove(&charm)
            .or_else(|| events.remove(&query))
            .ok_or_else(|| {
                PublishError::remote(format!("charm store response has no entry for {}", charm))
            })?;

        let record = event.into_record(&query)?;
        tracing::debug!(charms = %query, kind = ?record.kind, digest = ?record.digest, "charm event");
        Ok(record)
    }
}
