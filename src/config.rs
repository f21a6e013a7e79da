use anyhow::Context;
use chrono::Duration;
use dotenvy::dotenv;
use std::env;

/// Timings of the transaction lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct LifecyclePolicy {
    /// Delay before the sweeper first polls a freshly started transaction.
    pub first_check_delay: Duration,
    /// Delay before re-polling a transaction that is still open.
    pub recheck_interval: Duration,
    /// How long a success found by the sweeper is kept for the user to return.
    pub success_retention: Duration,
    /// How long a transaction is kept after the user returned.
    pub returned_retention: Duration,
    /// Transactions that stay unresolved this long are dropped.
    pub max_transaction_age: Duration,
    /// Minimum spacing of live status checks per transaction.
    pub min_check_interval: Duration,
    pub tick_interval: std::time::Duration,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            first_check_delay: Duration::hours(12),
            recheck_interval: Duration::hours(24),
            success_retention: Duration::hours(48),
            returned_retention: Duration::hours(1),
            max_transaction_age: Duration::days(7),
            min_check_interval: Duration::minutes(10),
            tick_interval: std::time::Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct IdealConfig {
    pub gateway_url: String,
    pub path_prefix: String,
    pub credential_id: String,
    pub payment_amounts: Vec<String>,
    pub donation_amounts: Vec<String>,
    pub payment_message: String,
    pub donation_message: String,
    /// Where the bank's return redirect is forwarded to after payment.
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdinConfig {
    pub gateway_url: String,
    pub path_prefix: String,
    pub credential_id: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub static_dir: Option<String>,
    pub log_format: LogFormat,
    pub irma_server_url: String,
    pub irma_server_token: String,
    pub ideal: Option<IdealConfig>,
    pub idin: Option<IdinConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let ideal = if env_flag("IDEAL_ENABLED")? {
            Some(IdealConfig {
                gateway_url: env::var("IDEAL_GATEWAY_URL")
                    .context("IDEAL_GATEWAY_URL is required when iDEAL is enabled")?,
                path_prefix: normalize_prefix(
                    &env::var("IDEAL_PATH_PREFIX").unwrap_or_else(|_| "/api/ideal/".to_string()),
                ),
                credential_id: env::var("IDEAL_CREDENTIAL_ID")
                    .context("IDEAL_CREDENTIAL_ID is required when iDEAL is enabled")?,
                payment_amounts: parse_list(&env::var("IDEAL_PAYMENT_AMOUNTS").unwrap_or_default()),
                donation_amounts: parse_list(&env::var("IDEAL_DONATION_AMOUNTS").unwrap_or_default()),
                payment_message: env::var("IDEAL_PAYMENT_MESSAGE")
                    .unwrap_or_else(|_| "iDEAL authentication".to_string()),
                donation_message: env::var("IDEAL_DONATION_MESSAGE")
                    .unwrap_or_else(|_| "Donation".to_string()),
                redirect_url: env::var("IDEAL_REDIRECT_URL").ok().filter(|v| !v.is_empty()),
            })
        } else {
            None
        };

        let idin = if env_flag("IDIN_ENABLED")? {
            Some(IdinConfig {
                gateway_url: env::var("IDIN_GATEWAY_URL")
                    .context("IDIN_GATEWAY_URL is required when iDIN is enabled")?,
                path_prefix: normalize_prefix(
                    &env::var("IDIN_PATH_PREFIX").unwrap_or_else(|_| "/api/idin/".to_string()),
                ),
                credential_id: env::var("IDIN_CREDENTIAL_ID")
                    .context("IDIN_CREDENTIAL_ID is required when iDIN is enabled")?,
                message: env::var("IDIN_MESSAGE").unwrap_or_else(|_| "idin".to_string()),
            })
        } else {
            None
        };

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            static_dir: env::var("STATIC_DIR").ok().filter(|v| !v.is_empty()),
            log_format: parse_log_format(&env::var("LOG_FORMAT").unwrap_or_default())?,
            irma_server_url: env::var("IRMA_SERVER_URL").context("IRMA_SERVER_URL must be set")?,
            irma_server_token: env::var("IRMA_SERVER_TOKEN").unwrap_or_default(),
            ideal,
            idin,
        })
    }
}

fn env_flag(name: &str) -> anyhow::Result<bool> {
    match env::var(name) {
        Ok(raw) => parse_flag(&raw).with_context(|| format!("{} must be true or false", name)),
        Err(_) => Ok(false),
    }
}

fn parse_flag(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("unrecognised flag value '{}'", other),
    }
}

fn parse_log_format(raw: &str) -> anyhow::Result<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "pretty" | "text" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
    }
}

/// Comma-separated list, blanks dropped.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Route prefixes are nested without a trailing slash and always rooted.
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
