use std::str::FromStr;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
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
/// Returns `ConfigError` if required env vars are missing or values are invalid.
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
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Optional values treat an empty string the same as unset.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("FTRACK_ENV", "development"))?;

    let bind_addr: SocketAddr = parse_var(&or_default, "FTRACK_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("FTRACK_LOG_LEVEL", "info");
    let channels_path = PathBuf::from(or_default(
        "FTRACK_CHANNELS_PATH",
        "./config/channels.yaml",
    ));

    let db_max_connections = parse_var(&or_default, "FTRACK_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_var(&or_default, "FTRACK_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_var(&or_default, "FTRACK_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let youtube_api_key = optional("YOUTUBE_API_KEY");
    let twitter_bearer_token = optional("TWITTER_BEARER_TOKEN");
    let extractor_url = optional("FTRACK_EXTRACTOR_URL");

    let request_timeout_secs = parse_var(&or_default, "FTRACK_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("FTRACK_USER_AGENT", "ftrack/0.1 (forecast-collector)");
    let primary_page_size: u32 = parse_var(&or_default, "FTRACK_PRIMARY_PAGE_SIZE", "10")?;
    let secondary_page_size: u32 = parse_var(&or_default, "FTRACK_SECONDARY_PAGE_SIZE", "50")?;
    let item_delay_ms = parse_var(&or_default, "FTRACK_ITEM_DELAY_MS", "1000")?;
    let channel_delay_ms = parse_var(&or_default, "FTRACK_CHANNEL_DELAY_MS", "2000")?;
    let batch_size: usize = parse_var(&or_default, "FTRACK_BATCH_SIZE", "50")?;
    let stale_job_secs = parse_var(&or_default, "FTRACK_STALE_JOB_SECS", "3600")?;
    let collect_cron = or_default("FTRACK_COLLECT_CRON", "0 */15 * * * *");

    if primary_page_size == 0 {
        return Err(invalid("FTRACK_PRIMARY_PAGE_SIZE", "must be at least 1"));
    }
    if secondary_page_size == 0 {
        return Err(invalid("FTRACK_SECONDARY_PAGE_SIZE", "must be at least 1"));
    }
    if batch_size == 0 {
        return Err(invalid("FTRACK_BATCH_SIZE", "must be at least 1"));
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        channels_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        youtube_api_key,
        twitter_bearer_token,
        extractor_url,
        request_timeout_secs,
        user_agent,
        primary_page_size,
        secondary_page_size,
        item_delay_ms,
        channel_delay_ms,
        batch_size,
        stale_job_secs,
        collect_cron,
    })
}

fn parse_var<T, D>(or_default: &D, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    D: Fn(&str, &str) -> String,
{
    let raw = or_default(var, default);
    raw.trim()
        .parse::<T>()
        .map_err(|e| invalid(var, &e.to_string()))
}

fn invalid(var: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(invalid(
            "FTRACK_ENV",
            &format!("unknown environment '{other}'"),
        )),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
