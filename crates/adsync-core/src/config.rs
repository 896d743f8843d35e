use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let config_path = PathBuf::from(or_default("ADSYNC_CONFIG_PATH", "./config/adsync.yaml"));
    let cookies_path = PathBuf::from(or_default("ADSYNC_COOKIES_PATH", "./config/cookies.txt"));
    let log_level = or_default("ADSYNC_LOG_LEVEL", "info");
    let request_timeout_secs = parse_u64("ADSYNC_REQUEST_TIMEOUT_SECS", "30")?;
    if request_timeout_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "ADSYNC_REQUEST_TIMEOUT_SECS".to_string(),
            reason: "timeout must be greater than zero".to_string(),
        });
    }
    let user_agent = or_default("ADSYNC_USER_AGENT", "adsync/0.1 (campaign-stats)");
    let max_retries = parse_u32("ADSYNC_MAX_RETRIES", "2")?;
    let retry_backoff_base_ms = parse_u64("ADSYNC_RETRY_BACKOFF_BASE_MS", "1000")?;
    let sheets_access_token = lookup("GOOGLE_SHEETS_ACCESS_TOKEN")
        .ok()
        .filter(|token| !token.trim().is_empty());

    Ok(AppConfig {
        config_path,
        cookies_path,
        log_level,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        sheets_access_token,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
