//! Charm URLs
//!
//! A charm URL has the textual form
//! `<schema>:[~<owner>/][<series>/]<name>[-<revision>]`, e.g.
//! `cs:~user/precise/wordpress-42`. Text without a schema is taken to be a
//! charm store URL.

use crate::core::error::ResolutionError;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// Schema of URLs served by the charm store
pub const STORE_SCHEMA: &str = "cs";

/// Schema of charms living in a local repository
pub const LOCAL_SCHEMA: &str = "local";

lazy_static! {
    static ref VALID_USER: Regex = Regex::new(r"^[a-z0-9][a-zA-Z0-9+.-]+$").unwrap();
    static ref VALID_SERIES: Regex = Regex::new(r"^[a-z]+([a-z0-9]+)?$").unwrap();
    static ref VALID_NAME: Regex =
        Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]*[a-z][a-z0-9]*)*$").unwrap();
}

/// Check a charm name against the store's naming rules
pub fn is_valid_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

/// Check a series name (e.g. `precise`)
pub fn is_valid_series(series: &str) -> bool {
    VALID_SERIES.is_match(series)
}

/// Check a user namespace (the part after `~`)
pub fn is_valid_user(user: &str) -> bool {
    VALID_USER.is_match(user)
}

/// Structured charm URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharmUrl {
    pub schema: String,
    pub owner: Option<String>,
    pub series: Option<String>,
    pub name: String,
    /// Assigned by the store; never chosen by the publisher.
    pub revision: Option<u32>,
}

impl CharmUrl {
    /// Build a store URL from its parts
    pub fn store(owner: Option<&str>, series: &str, name: &str) -> Self {
        Self {
            schema: STORE_SCHEMA.to_string(),
            owner: owner.map(str::to_string),
            series: Some(series.to_string()),
            name: name.to_string(),
            revision: None,
        }
    }

    /// Parse a charm URL.
    ///
    /// Only syntax is checked here. Whether the URL is publishable (store
    /// schema, series present) is decided by the location resolver.
    pub fn parse(text: &str) -> Result<Self, ResolutionError> {
        let invalid = |reason: &str| ResolutionError::InvalidUrl {
            url: text.to_string(),
            reason: reason.to_string(),
        };

        let (schema, path) = match text.split_once(':') {
            Some((schema, path)) => (schema, path),
            None => (STORE_SCHEMA, text),
        };
        if schema != STORE_SCHEMA && schema != LOCAL_SCHEMA {
            return Err(invalid("schema must be cs or local"));
        }

        let mut parts: Vec<&str> = path.split('/').collect();

        let mut owner = None;
        if let Some(user) = parts.first().and_then(|p| p.strip_prefix('~')) {
            if schema == LOCAL_SCHEMA {
                return Err(invalid("local charm URLs cannot have a user"));
            }
            if !is_valid_user(user) {
                return Err(invalid("invalid user name"));
            }
            owner = Some(user.to_string());
            parts.remove(0);
        }

        let (series, last) = match parts.as_slice() {
            [name] => (None, *name),
            [series, name] => {
                if !is_valid_series(series) {
                    return Err(invalid("invalid series"));
                }
                (Some(series.to_string()), *name)
            }
            _ => return Err(invalid("too many path segments")),
        };

        let (name, revision) = split_revision(last);
        if !is_valid_name(name) {
            return Err(invalid("invalid charm name"));
        }

        Ok(Self {
            schema: schema.to_string(),
            owner,
            series,
            name: name.to_string(),
            revision,
        })
    }

    /// Same charm at a store-assigned revision
    pub fn with_revision(&self, revision: u32) -> Self {
        Self {
            revision: Some(revision),
            ..self.clone()
        }
    }

    /// The URL without any revision, as used for store queries
    pub fn without_revision(&self) -> Self {
        Self {
            revision: None,
            ..self.clone()
        }
    }

    pub fn is_store_url(&self) -> bool {
        self.schema == STORE_SCHEMA
    }
}

/// `wordpress-42` -> (`wordpress`, Some(42)); names may contain dashes.
fn split_revision(text: &str) -> (&str, Option<u32>) {
    if let Some((name, suffix)) = text.rsplit_once('-')
        && !suffix.is_empty()
        && suffix.bytes().all(|b| b.is_ascii_digit())
        && let Ok(revision) = suffix.parse()
    {
        return (name, Some(revision));
    }
    (text, None)
}

impl fmt::Display for CharmUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.schema)?;
        if let Some(owner) = &self.owner {
            write!(f, "~{}/", owner)?;
        }
        if let Some(series) = &self.series {
            write!(f, "{}/", series)?;
        }
        write!(f, "{}", self.name)?;
        if let Some(revision) = self.revision {
            write!(f, "-{}", revision)?;
        }
        Ok(())
    }
}

impl FromStr for CharmUrl {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
