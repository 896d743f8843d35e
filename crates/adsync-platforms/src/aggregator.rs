//! Runs the platform adapters for one batch and merges their records.

use std::collections::BTreeMap;

use adsync_core::{AggregatedResult, GroupedDescriptors, Platform};

use crate::adapter::{PlatformAdapter, SessionUpdate};
use crate::error::PlatformError;

/// Output of one aggregation pass.
#[derive(Debug, Default)]
pub struct AggregationRun {
    pub result: AggregatedResult,
    /// Credentials refreshed by adapters during the pass.
    pub session_updates: Vec<SessionUpdate>,
}

/// Dispatches grouped descriptors to the adapter registered for each
/// platform, one platform after the other.
#[derive(Default)]
pub struct StatsAggregator {
    adapters: BTreeMap<Platform, Box<dyn PlatformAdapter>>,
}

impl StatsAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` for the platform it reports, replacing any
    /// adapter already registered for that platform.
    #[must_use]
    pub fn with_adapter(mut self, adapter: Box<dyn PlatformAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn register(&mut self, adapter: Box<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    #[must_use]
    pub fn has_adapter(&self, platform: Platform) -> bool {
        self.adapters.contains_key(&platform)
    }

    /// Runs every platform with a non-empty descriptor list.
    ///
    /// Adapter errors are logged and that platform contributes nothing.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`PlatformError`] (see
    /// [`PlatformError::is_fatal`]); nothing gathered before it is returned.
    pub async fn run(&self, grouped: &GroupedDescriptors) -> Result<AggregationRun, PlatformError> {
        let mut run = AggregationRun::default();

        for (platform, descriptors) in grouped {
            if descriptors.is_empty() {
                continue;
            }
            let Some(adapter) = self.adapters.get(platform) else {
                tracing::warn!(
                    platform = %platform,
                    campaigns = descriptors.len(),
                    "no adapter configured for platform; skipping"
                );
                continue;
            };

            match adapter.fetch_stats(descriptors).await {
                Ok(outcome) => {
                    tracing::info!(
                        platform = %platform,
                        requested = descriptors.len(),
                        collected = outcome.records.len(),
                        "platform statistics collected"
                    );
                    run.result.merge(*platform, outcome.records);
                    if let Some(update) = outcome.session_update {
                        run.session_updates.push(update);
                    }
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(platform = %platform, error = %e, "fatal platform error");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(platform = %platform, error = %e, "platform failed; continuing");
                }
            }
        }

        Ok(run)
    }
}
