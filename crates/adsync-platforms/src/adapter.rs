//! The capability every platform adapter provides.

use std::collections::BTreeMap;

use adsync_core::{CampaignDescriptor, MetricRecord, Platform};
use async_trait::async_trait;

use crate::error::PlatformError;

/// Credentials an adapter refreshed during a batch; the caller writes them
/// back into the durable configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    SocialGraph {
        access_token: String,
        session_id: String,
    },
}

/// What one adapter produced for one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterOutcome {
    pub records: BTreeMap<String, MetricRecord>,
    pub session_update: Option<SessionUpdate>,
}

impl AdapterOutcome {
    #[must_use]
    pub fn from_records(records: BTreeMap<String, MetricRecord>) -> Self {
        Self {
            records,
            session_update: None,
        }
    }
}

/// Fetches statistics for a batch of campaigns from one platform.
///
/// Adapters contain their own failures: a bad campaign is logged and the
/// records gathered so far are returned. Only errors for which
/// [`PlatformError::is_fatal`] holds are returned as `Err`.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// # Errors
    ///
    /// Returns a fatal [`PlatformError`] (currently only
    /// [`PlatformError::RateUnavailable`]).
    async fn fetch_stats(
        &self,
        descriptors: &[CampaignDescriptor],
    ) -> Result<AdapterOutcome, PlatformError>;
}
