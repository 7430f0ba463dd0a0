use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Default stopwords for keyword ranking: uninstall/delete mentions dominate
/// churn classes without saying why users leave.
pub const DEFAULT_KEYWORD_STOPWORDS: &str = "app-delete,app-uninstall";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
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
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable has a default, so an empty environment yields a usable
/// config for harvesting; the pipeline additionally needs the collaborator
/// URLs, which it checks itself.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;
    use std::str::FromStr;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    fn parse_as<T>(var: &str, raw: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    }

    let positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value: usize = parse_as(var, &or_default(var, default))?;
        if value == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    };

    let weight = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value: f64 = parse_as(var, &or_default(var, default))?;
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
        Ok(value)
    };

    let env = parse_environment(&or_default("CHURNLENS_ENV", "development"))?;
    let log_level = or_default("CHURNLENS_LOG_LEVEL", "info");
    let store_path = PathBuf::from(or_default("CHURNLENS_STORE_PATH", "./data/churnlens.db"));
    let app_id = optional("CHURNLENS_APP_ID");

    let source_base_url = or_default("CHURNLENS_SOURCE_URL", "http://localhost:8700");
    let source_request_timeout_secs: u64 = parse_as(
        "CHURNLENS_SOURCE_TIMEOUT_SECS",
        &or_default("CHURNLENS_SOURCE_TIMEOUT_SECS", "30"),
    )?;
    let source_user_agent = or_default(
        "CHURNLENS_SOURCE_USER_AGENT",
        "churnlens/0.1 (review-harvester)",
    );
    let source_page_size = positive_usize("CHURNLENS_SOURCE_PAGE_SIZE", "100")?;
    let source_inter_request_delay_ms: u64 = parse_as(
        "CHURNLENS_SOURCE_INTER_REQUEST_DELAY_MS",
        &or_default("CHURNLENS_SOURCE_INTER_REQUEST_DELAY_MS", "500"),
    )?;
    let source_max_pages = positive_usize("CHURNLENS_SOURCE_MAX_PAGES", "500")?;

    let classifier_url = optional("CHURNLENS_CLASSIFIER_URL");
    let keyword_url = optional("CHURNLENS_KEYWORD_URL");
    let narrator_url = optional("CHURNLENS_NARRATOR_URL");
    let collaborator_api_key = optional("CHURNLENS_COLLABORATOR_API_KEY");
    let collaborator_timeout_secs: u64 = parse_as(
        "CHURNLENS_COLLABORATOR_TIMEOUT_SECS",
        &or_default("CHURNLENS_COLLABORATOR_TIMEOUT_SECS", "60"),
    )?;
    let collaborator_max_retries: u32 = parse_as(
        "CHURNLENS_COLLABORATOR_MAX_RETRIES",
        &or_default("CHURNLENS_COLLABORATOR_MAX_RETRIES", "2"),
    )?;

    let classify_batch_size = positive_usize("CHURNLENS_CLASSIFY_BATCH_SIZE", "16")?;
    let keyword_batch_size = positive_usize("CHURNLENS_KEYWORD_BATCH_SIZE", "100")?;
    let keyword_max_concurrency = positive_usize("CHURNLENS_KEYWORD_MAX_CONCURRENCY", "4")?;
    let stage_timeout_secs: u64 = parse_as(
        "CHURNLENS_STAGE_TIMEOUT_SECS",
        &or_default("CHURNLENS_STAGE_TIMEOUT_SECS", "1800"),
    )?;

    let risk_weight_confirmed = weight("CHURNLENS_RISK_WEIGHT_CONFIRMED", "1.0")?;
    let risk_weight_complaint = weight("CHURNLENS_RISK_WEIGHT_COMPLAINT", "0.5")?;
    let top_keywords = positive_usize("CHURNLENS_TOP_KEYWORDS", "5")?;
    let keyword_stopwords = parse_list(&or_default(
        "CHURNLENS_KEYWORD_STOPWORDS",
        DEFAULT_KEYWORD_STOPWORDS,
    ));
    let narrative_max_evidence = positive_usize("CHURNLENS_NARRATIVE_MAX_EVIDENCE", "30")?;

    let db_max_connections: u32 = parse_as(
        "CHURNLENS_DB_MAX_CONNECTIONS",
        &or_default("CHURNLENS_DB_MAX_CONNECTIONS", "5"),
    )?;
    let db_acquire_timeout_secs: u64 = parse_as(
        "CHURNLENS_DB_ACQUIRE_TIMEOUT_SECS",
        &or_default("CHURNLENS_DB_ACQUIRE_TIMEOUT_SECS", "10"),
    )?;

    Ok(AppConfig {
        env,
        log_level,
        store_path,
        app_id,
        source_base_url,
        source_request_timeout_secs,
        source_user_agent,
        source_page_size,
        source_inter_request_delay_ms,
        source_max_pages,
        classifier_url,
        keyword_url,
        narrator_url,
        collaborator_api_key,
        collaborator_timeout_secs,
        collaborator_max_retries,
        classify_batch_size,
        keyword_batch_size,
        keyword_max_concurrency,
        stage_timeout_secs,
        risk_weight_confirmed,
        risk_weight_complaint,
        top_keywords,
        keyword_stopwords,
        narrative_max_evidence,
        db_max_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CHURNLENS_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

/// Comma-separated list, trimmed, empty entries dropped.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
