//! Configuration structures for charm-publisher
//!
//! Every field is optional so configurations from several sources can be
//! merged; the accessors on [`CharmPublishConfig`] fill in the defaults.

use crate::core::poll::PollOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default charm store endpoint
pub const DEFAULT_STORE_URL: &str = "https://store.juju.ubuntu.com";

/// Default HTTP request timeout against the store
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;

/// Root prefixed to every computed push location
pub const DEFAULT_PUSH_ROOT: &str = "lp:";

/// Long form of the default push root, also recognised when inferring URLs
pub const DEFAULT_PUSH_ALIAS: &str = "bzr+ssh://bazaar.launchpad.net/";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 3_600;

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharmPublishConfig {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<PushConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollConfig>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Charm store endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Base URL of the store API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Per-request timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Push location naming
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PushConfig {
    /// Prefix of computed push locations (e.g. `lp:`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// Other prefixes accepted when inferring a URL from a remembered location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
}

/// Post-push polling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PollConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for CharmPublishConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            store: None,
            push: None,
            poll: None,
        }
    }
}

impl CharmPublishConfig {
    pub fn store_url(&self) -> &str {
        self.store
            .as_ref()
            .and_then(|s| s.url.as_deref())
            .unwrap_or(DEFAULT_STORE_URL)
    }

    pub fn store_timeout(&self) -> Duration {
        let secs = self
            .store
            .as_ref()
            .and_then(|s| s.timeout_secs)
            .unwrap_or(DEFAULT_STORE_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn push_root(&self) -> &str {
        self.push
            .as_ref()
            .and_then(|p| p.root.as_deref())
            .unwrap_or(DEFAULT_PUSH_ROOT)
    }

    pub fn push_aliases(&self) -> Vec<String> {
        self.push
            .as_ref()
            .and_then(|p| p.aliases.clone())
            .unwrap_or_else(|| vec![DEFAULT_PUSH_ALIAS.to_string()])
    }

    pub fn poll_options(&self) -> PollOptions {
        let poll = self.poll.clone().unwrap_or_default();
        PollOptions {
            interval: Duration::from_millis(poll.interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS)),
            timeout: Duration::from_secs(poll.timeout_secs.unwrap_or(DEFAULT_POLL_TIMEOUT_SECS)),
            max_attempts: poll.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CharmPublishConfig::default();

        assert_eq!(config.version, "1.0");
        assert_eq!(config.store_url(), DEFAULT_STORE_URL);
        assert_eq!(config.store_timeout(), Duration::from_secs(30));
        assert_eq!(config.push_root(), "lp:");
        assert_eq!(config.push_aliases(), vec![DEFAULT_PUSH_ALIAS.to_string()]);
        assert_eq!(config.poll_options(), PollOptions::default());
    }

    #[test]
    fn test_deserialize_minimal_config() {
        let config: CharmPublishConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, CharmPublishConfig::default());
    }

    #[test]
    fn test_deserialize_full_config() {
        let yaml = r#"
version: "1.0"
store:
  url: http://localhost:8080
  timeoutSecs: 5
push:
  root: "file:///srv/branches/"
  aliases: []
poll:
  intervalMs: 250
  timeoutSecs: 60
  maxAttempts: 10
"#;
        let config: CharmPublishConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.store_url(), "http://localhost:8080");
        assert_eq!(config.store_timeout(), Duration::from_secs(5));
        assert_eq!(config.push_root(), "file:///srv/branches/");
        assert!(config.push_aliases().is_empty());

        let poll = config.poll_options();
        assert_eq!(poll.interval, Duration::from_millis(250));
        assert_eq!(poll.timeout, Duration::from_secs(60));
        assert_eq!(poll.max_attempts, Some(10));
    }

    #[test]
    fn test_serialize_skips_unset_sections() {
        let yaml = serde_yaml::to_string(&CharmPublishConfig::default()).unwrap();
        assert!(yaml.contains("version"));
        assert!(!yaml.contains("store"));
        assert!(!yaml.contains("poll"));
    }
}
