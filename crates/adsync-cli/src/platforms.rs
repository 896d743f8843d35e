//! Wiring of platform adapters from the durable configuration.

use std::sync::Arc;

use adsync_core::{AdsyncConfig, AppConfig, ConfigStore};
use adsync_platforms::{
    CbrRateProvider, CookieJar, HttpSettings, NativeMobileAdapter, NetworkAdsAdapter,
    RateProvider, SocialGraphAdapter, StatsAggregator,
};

/// Registers an adapter for every platform that has what it needs to run.
///
/// Network-Ads and Social-Graph-Ads need credentials in the configuration;
/// Native-Mobile-Ads relies on the cookie jar alone and is always registered.
///
/// # Errors
///
/// Returns an error if an adapter's HTTP client cannot be built.
pub(crate) fn build_aggregator(
    http: &HttpSettings,
    config: &AdsyncConfig,
    cookies: &CookieJar,
) -> anyhow::Result<StatsAggregator> {
    let mut aggregator = StatsAggregator::new();

    match &config.network_ads {
        Some(credentials) => {
            aggregator.register(Box::new(NetworkAdsAdapter::new(http, credentials.clone())?));
        }
        None => tracing::info!("no network_ads credentials configured; platform disabled"),
    }

    match &config.social_graph {
        Some(credentials) => {
            let rates: Arc<dyn RateProvider> =
                Arc::new(CbrRateProvider::new(http, &config.currency.code)?);
            aggregator.register(Box::new(SocialGraphAdapter::new(
                http,
                credentials.clone(),
                cookies.clone(),
                rates,
            )?));
        }
        None => tracing::info!("no social_graph credentials configured; platform disabled"),
    }

    aggregator.register(Box::new(NativeMobileAdapter::new(
        http,
        config.native_mobile.clone().unwrap_or_default(),
        cookies.clone(),
    )?));

    Ok(aggregator)
}

/// Print the conversion rate used for Social-Graph-Ads spend.
///
/// # Errors
///
/// Returns an error if the configuration cannot be read or the rate cannot
/// be fetched.
pub(crate) async fn run_rate(app: &AppConfig, store: &ConfigStore) -> anyhow::Result<()> {
    let config = store.load()?;
    let http = HttpSettings::from_app_config(app);
    let provider = CbrRateProvider::new(&http, &config.currency.code)?;
    let rate = provider.get_rate().await?;
    println!("1 {} = {rate:.4}", config.currency.code.to_uppercase());
    Ok(())
}
