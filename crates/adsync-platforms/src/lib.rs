//! Platform adapters for adsync.
//!
//! Each adapter turns [`adsync_core::CampaignDescriptor`]s into requests
//! against one advertising platform and parses the responses into
//! [`adsync_core::MetricRecord`]s. The [`StatsAggregator`] runs the adapters
//! for a batch and merges their output.

pub mod adapter;
pub mod adapters;
pub mod aggregator;
pub mod cookies;
pub mod currency;
pub mod error;
pub mod http;
pub mod scrape;

mod retry;

pub use adapter::{AdapterOutcome, PlatformAdapter, SessionUpdate};
pub use adapters::{NativeMobileAdapter, NetworkAdsAdapter, SocialGraphAdapter};
pub use aggregator::{AggregationRun, StatsAggregator};
pub use cookies::CookieJar;
pub use currency::{CbrRateProvider, RateProvider};
pub use error::PlatformError;
pub use http::HttpSettings;
