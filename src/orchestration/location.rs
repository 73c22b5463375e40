//! Location Resolver - maps charm URLs to branch push locations and back
//!
//! Charm branches live at one of two well-known places under the VCS root:
//!
//! - `<root>charms/<series>/<name>` for charms without an owner
//! - `<root>~<owner>/charms/<series>/<name>/trunk` for personal charms
//!
//! The same conventions are used backwards to infer the charm URL from the
//! location a branch was last pushed to.

use crate::core::charm_url::{CharmUrl, is_valid_name, is_valid_series, is_valid_user};
use crate::core::config::{DEFAULT_PUSH_ALIAS, DEFAULT_PUSH_ROOT};
use crate::core::error::ResolutionError;
use std::fmt;
use std::sync::Arc;

/// Rewrites a computed push location before the push happens
pub type LocationOverride = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Resolves charm URLs and push locations
#[derive(Clone)]
pub struct LocationResolver {
    root: String,
    aliases: Vec<String>,
    location_override: Option<LocationOverride>,
}

impl fmt::Debug for LocationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationResolver")
            .field("root", &self.root)
            .field("aliases", &self.aliases)
            .field("location_override", &self.location_override.is_some())
            .finish()
    }
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self::new(DEFAULT_PUSH_ROOT).with_aliases(vec![DEFAULT_PUSH_ALIAS.to_string()])
    }
}

impl LocationResolver {
    /// Create a resolver whose push locations start with `root` (e.g. `lp:`)
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            aliases: Vec::new(),
            location_override: None,
        }
    }

    /// Additional roots recognised when inferring a URL from a location
    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Install a rewrite applied to every computed push location
    ///
    /// # Examples
    ///
    /// ```
    /// use charm_publisher::orchestration::LocationResolver;
    /// use charm_publisher::CharmUrl;
    ///
    /// let resolver = LocationResolver::default()
    ///     .with_override(|location| location.replace("lp:", "/tmp/scratch/"));
    /// let url = CharmUrl::store(None, "precise", "wordpress");
    ///
    /// assert_eq!(resolver.publish_location_for(&url), "/tmp/scratch/charms/precise/wordpress");
    /// ```
    pub fn with_override<F>(mut self, rewrite: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.location_override = Some(Arc::new(rewrite));
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Work out the charm URL to publish.
    ///
    /// An explicit URL wins; otherwise the URL is inferred from the location
    /// the branch was last pushed to.
    pub fn resolve_url(
        &self,
        explicit: Option<&str>,
        remembered_location: Option<&str>,
    ) -> Result<CharmUrl, ResolutionError> {
        match explicit {
            Some(text) => self.resolve_explicit(text),
            None => {
                let location = remembered_location.ok_or(ResolutionError::NoPushLocation)?;
                self.url_from_location(location)
                    .ok_or_else(|| ResolutionError::UnrecognizedLocation {
                        location: location.to_string(),
                    })
            }
        }
    }

    fn resolve_explicit(&self, text: &str) -> Result<CharmUrl, ResolutionError> {
        let url = CharmUrl::parse(text)?;

        if url.series.is_none() {
            return Err(ResolutionError::NoSeries {
                url: text.to_string(),
            });
        }
        if !url.is_store_url() {
            return Err(ResolutionError::WrongRepository {
                url: text.to_string(),
            });
        }
        if url.revision.is_some() {
            return Err(ResolutionError::InvalidUrl {
                url: text.to_string(),
                reason: "revisions are assigned by the charm store".to_string(),
            });
        }

        Ok(url)
    }

    /// Conventional push location for a store URL
    pub fn push_location_for(&self, url: &CharmUrl) -> String {
        let series = url.series.as_deref().unwrap_or_default();
        match &url.owner {
            None => format!("{}charms/{}/{}", self.root, series, url.name),
            Some(owner) => format!(
                "{}~{}/charms/{}/{}/trunk",
                self.root, owner, series, url.name
            ),
        }
    }

    /// Push location after the override, if any, has been applied
    pub fn publish_location_for(&self, url: &CharmUrl) -> String {
        let location = self.push_location_for(url);
        match &self.location_override {
            Some(rewrite) => rewrite(&location),
            None => location,
        }
    }

    /// Inverse of [`push_location_for`](Self::push_location_for)
    pub fn url_from_location(&self, location: &str) -> Option<CharmUrl> {
        let path = std::iter::once(&self.root)
            .chain(self.aliases.iter())
            .filter(|root| !root.is_empty())
            .find_map(|root| location.strip_prefix(root.as_str()))?;

        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            ["charms", series, name] => valid_url(None, series, name),
            [user, "charms", series, name, "trunk"] => {
                let owner = user.strip_prefix('~')?;
                if !is_valid_user(owner) {
                    return None;
                }
                valid_url(Some(owner), series, name)
            }
            _ => None,
        }
    }
}

fn valid_url(owner: Option<&str>, series: &str, name: &str) -> Option<CharmUrl> {
    (is_valid_series(series) && is_valid_name(name)).then(|| CharmUrl::store(owner, series, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_location_without_owner() {
        let resolver = LocationResolver::default();
        let url = CharmUrl::parse("cs:precise/wordpress").unwrap();

        assert_eq!(
            resolver.push_location_for(&url),
            "lp:charms/precise/wordpress"
        );
    }

    #[test]
    fn test_push_location_with_owner() {
        let resolver = LocationResolver::default();
        let url = CharmUrl::parse("cs:~user/precise/wordpress").unwrap();

        assert_eq!(
            resolver.push_location_for(&url),
            "lp:~user/charms/precise/wordpress/trunk"
        );
    }

    #[test]
    fn test_override_applies_after_convention() {
        let resolver = LocationResolver::default().with_override(|location| {
            assert_eq!(location, "lp:~user/charms/precise/wordpress/trunk");
            "/tmp/push-target".to_string()
        });
        let url = CharmUrl::parse("cs:~user/precise/wordpress").unwrap();

        assert_eq!(resolver.publish_location_for(&url), "/tmp/push-target");
        assert_eq!(
            resolver.push_location_for(&url),
            "lp:~user/charms/precise/wordpress/trunk"
        );
    }

    #[test]
    fn test_resolve_explicit_url() {
        let resolver = LocationResolver::default();

        let url = resolver.resolve_url(Some("precise/wordpress"), None).unwrap();
        assert_eq!(url.to_string(), "cs:precise/wordpress");

        // An explicit URL wins over the remembered location.
        let url = resolver
            .resolve_url(Some("cs:~user/precise/wordpress"), Some("lp:charms/oneiric/mysql"))
            .unwrap();
        assert_eq!(url.to_string(), "cs:~user/precise/wordpress");
    }

    #[test]
    fn test_resolve_missing_series() {
        let resolver = LocationResolver::default();

        let error = resolver.resolve_url(Some("wordpress"), None).unwrap_err();
        assert!(matches!(error, ResolutionError::NoSeries { .. }));

        let error = resolver.resolve_url(Some("cs:wordpress"), None).unwrap_err();
        assert_eq!(
            error.to_string(),
            r#"cannot infer charm URL for "cs:wordpress": no series provided"#
        );
    }

    #[test]
    fn test_resolve_wrong_repository() {
        let resolver = LocationResolver::default();

        let error = resolver
            .resolve_url(Some("local:precise/wordpress"), None)
            .unwrap_err();

        assert_eq!(
            error.to_string(),
            "charm URL must reference the juju charm store"
        );
    }

    #[test]
    fn test_resolve_rejects_revision() {
        let resolver = LocationResolver::default();

        let error = resolver
            .resolve_url(Some("cs:precise/wordpress-3"), None)
            .unwrap_err();

        assert!(matches!(error, ResolutionError::InvalidUrl { .. }));
    }

    #[test]
    fn test_resolve_without_push_location() {
        let resolver = LocationResolver::default();

        assert_eq!(
            resolver.resolve_url(None, None),
            Err(ResolutionError::NoPushLocation)
        );
    }

    #[test]
    fn test_resolve_from_remembered_location() {
        let resolver = LocationResolver::default();

        let url = resolver
            .resolve_url(None, Some("lp:charms/precise/wordpress"))
            .unwrap();
        assert_eq!(url.to_string(), "cs:precise/wordpress");

        let url = resolver
            .resolve_url(
                None,
                Some("bzr+ssh://bazaar.launchpad.net/~user/charms/precise/wordpress/trunk"),
            )
            .unwrap();
        assert_eq!(url.to_string(), "cs:~user/precise/wordpress");
    }

    #[test]
    fn test_resolve_unrecognized_location() {
        let resolver = LocationResolver::default();

        for location in [
            "/tmp/foo",
            "lp:charms/precise",
            "lp:~user/charms/precise/wordpress",
            "lp:user/charms/precise/wordpress/trunk",
            "lp:charms/precise/Word_Press",
        ] {
            assert_eq!(
                resolver.resolve_url(None, Some(location)),
                Err(ResolutionError::UnrecognizedLocation {
                    location: location.to_string(),
                }),
                "{}",
                location
            );
        }

        let error = resolver.resolve_url(None, Some("/tmp/foo")).unwrap_err();
        assert_eq!(
            error.to_string(),
            r#"cannot infer charm URL from branch location: "/tmp/foo""#
        );
    }

    #[test]
    fn test_location_round_trip_with_custom_root() {
        let resolver = LocationResolver::new("file:///srv/branches/");
        let url = CharmUrl::store(Some("user"), "precise", "wordpress");

        let location = resolver.push_location_for(&url);
        assert_eq!(
            location,
            "file:///srv/branches/~user/charms/precise/wordpress/trunk"
        );
        assert_eq!(resolver.url_from_location(&location), Some(url));
    }
}
