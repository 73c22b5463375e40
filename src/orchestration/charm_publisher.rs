//! Charm Publisher - Main orchestrator for publishing a charm branch
//!
//! Manages one publish attempt end to end:
//! - Charm URL resolution (explicit or inferred from the push location)
//! - Branch validation (clean tree, metadata, name check)
//! - Idempotency check against the store's record for the local digest
//! - Push of the branch to its conventional location
//! - Polling the store until its tip moves, and race detection
//!
//! The store is eventually consistent and offers no transactions, so the
//! outcome is decided purely by comparing digests: the tip must move away
//! from the baseline read before the push, and it must move to the local
//! digest.

use crate::core::charm_url::CharmUrl;
use crate::core::config::CharmPublishConfig;
use crate::core::error::{PublishError, ValidationError};
use crate::core::poll::{PollManager, PollOptions};
use crate::core::state_machine::{PublishState, PublishStateMachine};
use crate::core::traits::{Digest, DigestSource, EventKind, EventRecord, StoreClient};
use crate::orchestration::location::LocationResolver;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Outcome of a successful publish
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReport {
    /// Charm URL carrying the store-assigned revision
    pub url: CharmUrl,
    pub digest: Digest,
    pub revision: u32,
    /// `ShortCircuitDone` when the store already had the digest, `Success` otherwise
    pub state: PublishState,
    /// Where the branch was pushed, if a push happened
    pub pushed_to: Option<String>,
    /// Tip queries made after the push
    pub polls: u32,
    pub duration_ms: u64,
}

impl PublishReport {
    /// The line printed on success: `<url>-<revision>`
    pub fn output_line(&self) -> String {
        format!("{}\n", self.url)
    }
}

/// Main charm publisher orchestrator
pub struct CharmPublisher {
    source: Arc<dyn DigestSource>,
    store: Arc<dyn StoreClient>,
    resolver: LocationResolver,
    poll: PollOptions,
}

impl CharmPublisher {
    /// Create a new CharmPublisher
    ///
    /// # Arguments
    ///
    /// * `source` - The local charm branch
    /// * `store` - Client for the charm store's event endpoint
    /// * `resolver` - URL/location conventions, including any location override
    /// * `poll` - Interval and bound of the post-push polling
    pub fn new(
        source: Arc<dyn DigestSource>,
        store: Arc<dyn StoreClient>,
        resolver: LocationResolver,
        poll: PollOptions,
    ) -> Self {
        Self {
            source,
            store,
            resolver,
            poll,
        }
    }

    /// Create a publisher wired from loaded configuration
    pub fn from_config(
        config: &CharmPublishConfig,
        source: Arc<dyn DigestSource>,
        store: Arc<dyn StoreClient>,
    ) -> Self {
        let resolver =
            LocationResolver::new(config.push_root()).with_aliases(config.push_aliases());
        Self::new(source, store, resolver, config.poll_options())
    }

    /// Replace the location resolver, e.g. to install a location override
    pub fn with_resolver(mut self, resolver: LocationResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Publish the charm
    ///
    /// # Arguments
    ///
    /// * `explicit_url` - Charm URL given by the user; inferred from the
    ///   branch's remembered push location when absent
    pub async fn run(&self, explicit_url: Option<&str>) -> Result<PublishReport, PublishError> {
        let span = tracing::info_span!(
            "publish",
            attempt = %Uuid::new_v4(),
            url = tracing::field::Empty
        );

        async move {
            let started = Instant::now();
            let mut machine = PublishStateMachine::new();

            let result = self.drive(explicit_url, &mut machine, started).await;

            if let Err(error) = &result {
                if !machine.get_state().is_terminal()
                    && let Err(e) = machine.transition(PublishState::Failed)
                {
                    tracing::warn!(error = %e, "cannot record failure state");
                }
                tracing::debug!(code = error.code(), %error, "publish failed");
            }
            tracing::debug!(history = %machine.get_history(), "publish finished");

            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        explicit_url: Option<&str>,
        machine: &mut PublishStateMachine,
        started: Instant,
    ) -> Result<PublishReport, PublishError> {
        // 1. Resolve
        let remembered = match explicit_url {
            Some(_) => None,
            None => self.source.remembered_push_location().await?,
        };
        let url = self
            .resolver
            .resolve_url(explicit_url, remembered.as_deref())?;
        machine.transition(PublishState::Resolved)?;
        tracing::Span::current().record("url", tracing::field::display(&url));
        tracing::info!("resolved charm URL");

        // 2. Validate
        if !self.source.is_clean().await? {
            return Err(ValidationError::BranchNotClean.into());
        }
        let metadata = self.source.load_metadata().await?;
        if metadata.name != url.name {
            return Err(ValidationError::NameMismatch {
                got: metadata.name,
                want: url.name.clone(),
            }
            .into());
        }
        machine.transition(PublishState::Validated)?;

        let local = self.source.local_digest().await?;
        machine.transition(PublishState::DigestObtained)?;
        tracing::debug!(digest = %local, "local digest");

        // 3. Has the store seen this exact snapshot?
        let record = self.store.query_event(&url, Some(&local)).await?;
        match record.kind {
            EventKind::Published => {
                tracing::info!("charm already published at this digest");
                return finish(
                    &url,
                    &local,
                    &record,
                    machine,
                    PublishState::ShortCircuitDone,
                    None,
                    0,
                    started,
                );
            }
            EventKind::PublishError => {
                machine.transition(PublishState::PublishErrorReported)?;
                return Err(PublishError::PublishFailed {
                    errors: record.errors,
                });
            }
            EventKind::NotFound => {}
        }

        // 4. Baseline tip; its digest must change before the push is settled.
        let baseline = self.store.query_event(&url, None).await?;
        if baseline.is_for(&local) {
            // The store caught up between the two queries.
            match baseline.kind {
                EventKind::Published => {
                    return finish(
                        &url,
                        &local,
                        &baseline,
                        machine,
                        PublishState::ShortCircuitDone,
                        None,
                        0,
                        started,
                    );
                }
                EventKind::PublishError => {
                    machine.transition(PublishState::PublishErrorReported)?;
                    return Err(PublishError::PublishFailed {
                        errors: baseline.errors,
                    });
                }
                EventKind::NotFound => {}
            }
        }
        tracing::debug!(baseline = ?baseline.digest, "baseline tip");

        // 5. Push
        let location = self.resolver.publish_location_for(&url);
        tracing::info!(%location, "pushing branch");
        self.source.push(&location, true).await?;
        machine.transition(PublishState::Pushed)?;

        // 6. Poll until the tip moves
        machine.transition(PublishState::Polling)?;
        let poller = PollManager::new(self.poll.clone());
        let outcome = poller
            .poll_until(
                || self.store.query_event(&url, None),
                |tip| tip.digest != baseline.digest,
            )
            .await?;
        let tip = outcome.value;
        tracing::debug!(tip = ?tip.digest, polls = outcome.attempts, "charm tip changed");

        // 7. Did it move to our snapshot?
        if tip.is_for(&local) {
            match tip.kind {
                EventKind::Published => {
                    tracing::info!("charm published");
                    return finish(
                        &url,
                        &local,
                        &tip,
                        machine,
                        PublishState::Success,
                        Some(location),
                        outcome.attempts,
                        started,
                    );
                }
                EventKind::PublishError => {
                    machine.transition(PublishState::PublishErrorReported)?;
                    return Err(PublishError::PublishFailed { errors: tip.errors });
                }
                EventKind::NotFound => {}
            }
        }

        machine.transition(PublishState::RaceError)?;
        Err(PublishError::Race {
            local,
            observed: tip.digest,
        })
    }
}

/// Record a successful end state and build the report.
///
/// A published record without a revision is a store fault, so the revision is
/// checked before the state changes.
#[allow(clippy::too_many_arguments)]
fn finish(
    url: &CharmUrl,
    local: &str,
    record: &EventRecord,
    machine: &mut PublishStateMachine,
    state: PublishState,
    pushed_to: Option<String>,
    polls: u32,
    started: Instant,
) -> Result<PublishReport, PublishError> {
    let revision = record.revision.ok_or_else(|| {
        PublishError::remote(format!(
            "charm store reported {} as published without a revision",
            url
        ))
    })?;
    machine.transition(state)?;

    Ok(PublishReport {
        url: url.with_revision(revision),
        digest: local.to_string(),
        revision,
        state,
        pushed_to,
        polls,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}
