//! Configuration file loader for charm-publisher
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::PublishError;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".charm-publish.yaml";

lazy_static! {
    /// Environment variable reference (${VAR_NAME})
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Configuration load options
#[derive(Debug, Clone)]
pub struct ConfigLoadOptions {
    /// Directory holding the charm branch
    pub project_path: PathBuf,

    /// CLI arguments (highest priority)
    pub cli_args: Option<CharmPublishConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    pub valid: bool,
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "poll.intervalMs")
    pub field: String,
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Project config (<branch>/.charm-publish.yaml)
    /// 4. Global config (~/.charm-publish.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<CharmPublishConfig, PublishError> {
        let mut configs: Vec<CharmPublishConfig> = vec![CharmPublishConfig::default()];

        if let Some(home) = options.env.get("HOME") {
            let global_path = PathBuf::from(home).join(CONFIG_FILENAME);
            if let Some(global_config) = Self::load_config_file(&global_path).await? {
                configs.push(global_config);
            }
        }

        let project_path = options.project_path.join(CONFIG_FILENAME);
        if let Some(project_config) = Self::load_config_file(&project_path).await? {
            configs.push(project_config);
        }

        if let Some(env_config) = Self::load_env_config(&options.env)? {
            configs.push(env_config);
        }

        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        let mut config = Self::merge_configs(configs);
        Self::expand_env_vars(&mut config, &options.env);

        let validation = Self::validate(&config);
        for warning in &validation.warnings {
            tracing::warn!(field = %warning.field, "{}", warning.message);
        }
        if !validation.valid {
            return Err(PublishError::Config(Self::format_validation_result(
                &validation,
            )));
        }

        Ok(config)
    }

    /// Load configuration from a YAML file; a missing file is not an error
    async fn load_config_file(file_path: &Path) -> Result<Option<CharmPublishConfig>, PublishError> {
        if !file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(file_path).await.map_err(|e| {
            PublishError::Config(format!(
                "failed to read {}: {}",
                file_path.display(),
                e
            ))
        })?;

        let config: CharmPublishConfig = serde_yaml::from_str(&content).map_err(|e| {
            PublishError::Config(format!(
                "failed to parse {}: {}",
                file_path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %file_path.display(), "loaded configuration file");
        Ok(Some(config))
    }

    /// Load configuration from environment variables
    fn load_env_config(
        env: &HashMap<String, String>,
    ) -> Result<Option<CharmPublishConfig>, PublishError> {
        let mut config = CharmPublishConfig::default();
        let mut has_changes = false;

        if let Some(url) = env.get("CHARM_STORE_URL") {
            config.store = Some(StoreConfig {
                url: Some(url.clone()),
                timeout_secs: None,
            });
            has_changes = true;
        }

        let parse_number = |name: &str, value: &str| {
            value.parse::<u64>().map_err(|_| {
                PublishError::Config(format!("{} must be a number, got {:?}", name, value))
            })
        };

        if let Some(value) = env.get("CHARM_PUBLISH_POLL_INTERVAL_MS") {
            let poll = config.poll.get_or_insert_with(PollConfig::default);
            poll.interval_ms = Some(parse_number("CHARM_PUBLISH_POLL_INTERVAL_MS", value)?);
            has_changes = true;
        }

        if let Some(value) = env.get("CHARM_PUBLISH_POLL_TIMEOUT_SECS") {
            let poll = config.poll.get_or_insert_with(PollConfig::default);
            poll.timeout_secs = Some(parse_number("CHARM_PUBLISH_POLL_TIMEOUT_SECS", value)?);
            has_changes = true;
        }

        Ok(if has_changes { Some(config) } else { None })
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<CharmPublishConfig>) -> CharmPublishConfig {
        let mut result = CharmPublishConfig::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target, field by field
    fn merge_into(target: &mut CharmPublishConfig, source: CharmPublishConfig) {
        if !source.version.is_empty() {
            target.version = source.version;
        }

        if let Some(source_store) = source.store {
            let target_store = target.store.get_or_insert_with(StoreConfig::default);
            if source_store.url.is_some() {
                target_store.url = source_store.url;
            }
            if source_store.timeout_secs.is_some() {
                target_store.timeout_secs = source_store.timeout_secs;
            }
        }

        if let Some(source_push) = source.push {
            let target_push = target.push.get_or_insert_with(PushConfig::default);
            if source_push.root.is_some() {
                target_push.root = source_push.root;
            }
            if source_push.aliases.is_some() {
                target_push.aliases = source_push.aliases;
            }
        }

        if let Some(source_poll) = source.poll {
            let target_poll = target.poll.get_or_insert_with(PollConfig::default);
            if source_poll.interval_ms.is_some() {
                target_poll.interval_ms = source_poll.interval_ms;
            }
            if source_poll.timeout_secs.is_some() {
                target_poll.timeout_secs = source_poll.timeout_secs;
            }
            if source_poll.max_attempts.is_some() {
                target_poll.max_attempts = source_poll.max_attempts;
            }
        }
    }

    /// Expand ${VAR} references in the store URL
    fn expand_env_vars(config: &mut CharmPublishConfig, env: &HashMap<String, String>) {
        if let Some(store) = &mut config.store
            && let Some(url) = &store.url
        {
            store.url = Some(Self::expand_string(url, env));
        }
    }

    /// Expand environment variables in a single string
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        let mut result = input.to_string();
        for cap in ENV_VAR_PATTERN.captures_iter(input) {
            let var_name = &cap[1];
            if let Some(value) = env.get(var_name) {
                result = result.replace(&format!("${{{}}}", var_name), value);
            } else {
                tracing::warn!(variable = var_name, "environment variable not found");
            }
        }
        result
    }

    /// Validate configuration
    pub fn validate(config: &CharmPublishConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if config.version != "1.0" {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some("Currently supported version is \"1.0\" only".to_string()),
            });
        }

        let url = config.store_url();
        if url.is_empty() {
            errors.push(ConfigValidationError {
                field: "store.url".to_string(),
                message: "store URL must not be empty".to_string(),
            });
        } else if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push(ConfigValidationError {
                field: "store.url".to_string(),
                message: format!("store URL must be http or https, got {}", url),
            });
        }

        if config.push_root().is_empty() {
            errors.push(ConfigValidationError {
                field: "push.root".to_string(),
                message: "push root must not be empty".to_string(),
            });
        }

        let poll = config.poll_options();
        if poll.interval.is_zero() {
            errors.push(ConfigValidationError {
                field: "poll.intervalMs".to_string(),
                message: "poll interval must be greater than zero".to_string(),
            });
        } else if poll.interval >= poll.timeout {
            warnings.push(ConfigValidationWarning {
                field: "poll.timeoutSecs".to_string(),
                message: "poll timeout is not longer than one interval".to_string(),
                suggestion: Some("Increase poll.timeoutSecs".to_string()),
            });
        }
        if poll.max_attempts == Some(0) {
            errors.push(ConfigValidationError {
                field: "poll.maxAttempts".to_string(),
                message: "maxAttempts must be at least 1".to_string(),
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        for error in &result.errors {
            lines.push(format!("[{}] {}", error.field, error.message));
        }
        for warning in &result.warnings {
            let mut line = format!("warning: [{}] {}", warning.field, warning.message);
            if let Some(suggestion) = &warning.suggestion {
                line.push_str(&format!(" ({})", suggestion));
            }
            lines.push(line);
        }

        lines.join("; ")
    }
}
