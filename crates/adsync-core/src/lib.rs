//! Shared data model and configuration for adsync.
//!
//! Campaign descriptors flow in from a request file, platform adapters turn
//! them into [`MetricRecord`]s, and the sheet sync writes those records into
//! the rows tracked by the [`RowCache`].

pub mod app_config;
pub mod campaigns;
pub mod config;
pub mod error;
pub mod metrics;
pub mod requests;
pub mod sheet;
pub mod store;

pub use app_config::AppConfig;
pub use campaigns::{CampaignDescriptor, DateRange, GroupedDescriptors, PeriodMode, Platform};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::ConfigError;
pub use metrics::{AggregatedResult, Metric, MetricRecord, MetricValue, WantedMetric};
pub use requests::{load_requests, parse_requests};
pub use sheet::{ColumnMap, ColumnSpec, RowCache, SheetSettings};
pub use store::{
    AdsyncConfig, ConfigStore, CurrencySettings, NativeMobileSettings, NetworkAdsCredentials,
    SocialGraphCredentials,
};
