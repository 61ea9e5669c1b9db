use crate::constants::{network, oauth, pagination, rate_limit, retry};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const ENV_PREFIX: &str = "COBRANSAAS";
const DEFAULT_HOST: &str = "https://dsv04.dsv.cobransaas.com.br";
const DEFAULT_SETTINGS_FILE: &str = "cobransaas";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl SettingsError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SettingsError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Deserialize)]
struct RawSettings {
    host: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    timeout: u64,
    max_retries: u32,
    retry_base_delay_ms: u64,
    retry_max_delay_ms: u64,
    retry_jitter: f64,
    retry_writes: bool,
    rate_limit_per_second: u32,
    token_safety_margin_secs: u64,
    max_pages: u32,
}

/// Connection and credential settings, read once at startup.
#[derive(Clone)]
pub struct Settings {
    pub host: Url,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub retry_jitter: f64,
    /// Allow transient-failure retries for state-changing calls.
    pub retry_writes: bool,
    /// Zero disables the limiter.
    pub rate_limit_per_second: u32,
    pub token_safety_margin: Duration,
    pub max_pages: u32,
}

impl Settings {
    /// Loads defaults, then the settings file, then `COBRANSAAS_*` environment variables.
    ///
    /// An explicit `file` must exist; otherwise `cobransaas.{toml,json,yaml}` in the
    /// working directory is used when present.
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder()
            .set_default("host", DEFAULT_HOST)?
            .set_default("timeout", network::TIMEOUT_API_REQUEST_MS / 1000)?
            .set_default("max_retries", retry::MAX_RETRIES)?
            .set_default("retry_base_delay_ms", retry::BASE_DELAY_MS)?
            .set_default("retry_max_delay_ms", retry::MAX_DELAY_MS)?
            .set_default("retry_jitter", retry::JITTER)?
            .set_default("retry_writes", false)?
            .set_default("rate_limit_per_second", rate_limit::MAX_REQUESTS)?
            .set_default("token_safety_margin_secs", oauth::SAFETY_MARGIN_SECS)?
            .set_default("max_pages", pagination::MAX_PAGES)?;

        builder = match file {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name(DEFAULT_SETTINGS_FILE).required(false)),
        };
        // Values stay strings here; numeric fields are converted on deserialize so
        // credentials such as `000123` keep their exact text.
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));

        let raw: RawSettings = builder.build()?.try_deserialize()?;
        Self::from_raw(raw)
    }

    /// Settings with default tuning for the given host and credentials.
    pub fn new(
        host: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, SettingsError> {
        Self::from_raw(RawSettings {
            host: host.to_string(),
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            timeout: network::TIMEOUT_API_REQUEST_MS / 1000,
            max_retries: retry::MAX_RETRIES,
            retry_base_delay_ms: retry::BASE_DELAY_MS,
            retry_max_delay_ms: retry::MAX_DELAY_MS,
            retry_jitter: retry::JITTER,
            retry_writes: false,
            rate_limit_per_second: rate_limit::MAX_REQUESTS,
            token_safety_margin_secs: oauth::SAFETY_MARGIN_SECS,
            max_pages: pagination::MAX_PAGES,
        })
    }

    fn from_raw(raw: RawSettings) -> Result<Self, SettingsError> {
        let host = parse_host(&raw.host)?;
        let client_id = required(raw.client_id, "client_id")?;
        let client_secret = required(raw.client_secret, "client_secret")?;
        if raw.timeout == 0 {
            return Err(SettingsError::invalid("timeout", "must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&raw.retry_jitter) {
            return Err(SettingsError::invalid("retry_jitter", "must be between 0 and 1"));
        }
        if raw.retry_max_delay_ms < raw.retry_base_delay_ms {
            return Err(SettingsError::invalid(
                "retry_max_delay_ms",
                "must not be lower than retry_base_delay_ms",
            ));
        }
        if raw.max_pages == 0 {
            return Err(SettingsError::invalid("max_pages", "must be greater than zero"));
        }

        Ok(Self {
            host,
            client_id,
            client_secret,
            timeout: Duration::from_secs(raw.timeout),
            max_retries: raw.max_retries,
            retry_base_delay: Duration::from_millis(raw.retry_base_delay_ms),
            retry_max_delay: Duration::from_millis(raw.retry_max_delay_ms),
            retry_jitter: raw.retry_jitter,
            retry_writes: raw.retry_writes,
            rate_limit_per_second: raw.rate_limit_per_second,
            token_safety_margin: Duration::from_secs(raw.token_safety_margin_secs),
            max_pages: raw.max_pages,
        })
    }

    pub fn api_base_url(&self) -> String {
        format!("{}{}", self.host_root(), network::API_BASE_PATH)
    }

    pub fn token_url(&self) -> String {
        format!("{}{}", self.host_root(), network::OAUTH_TOKEN_PATH)
    }

    fn host_root(&self) -> &str {
        self.host.as_str().trim_end_matches('/')
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("host", &self.host.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("retry_max_delay", &self.retry_max_delay)
            .field("retry_jitter", &self.retry_jitter)
            .field("retry_writes", &self.retry_writes)
            .field("rate_limit_per_second", &self.rate_limit_per_second)
            .field("token_safety_margin", &self.token_safety_margin)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

fn parse_host(raw: &str) -> Result<Url, SettingsError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SettingsError::invalid("host", "must not be empty"));
    }
    let url = Url::parse(trimmed).map_err(|err| SettingsError::invalid("host", err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SettingsError::invalid("host", "scheme must be http or https"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(SettingsError::invalid("host", "must not carry a query or fragment"));
    }
    Ok(url)
}

fn required(value: Option<String>, field: &'static str) -> Result<String, SettingsError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SettingsError::invalid(field, "is required")),
    }
}
