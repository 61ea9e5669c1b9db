use crate::constants::{limits, oauth};
use crate::errors::ApiError;
use crate::services::logger::Logger;
use crate::settings::Settings;
use crate::utils::redact::redact_text;
use crate::utils::text::preview;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A bearer credential as handed to the executor. The value is never logged.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    token_type: String,
    expires_at: Instant,
}

impl AccessToken {
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.value)
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    fn same_as(&self, other: &AccessToken) -> bool {
        self.value == other.value
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("value", &"[redacted]")
            .field("expired", &self.is_expired())
            .finish()
    }
}

#[derive(Deserialize)]
struct GrantResponse {
    access_token: Option<String>,
    expires_in: Option<Value>,
    token_type: Option<String>,
}

/// Holds at most one token and serializes grants behind an async mutex.
pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    timeout: Duration,
    safety_margin: Duration,
    current: Mutex<Option<AccessToken>>,
    logger: Logger,
}

impl TokenManager {
    pub fn new(settings: &Settings, http: reqwest::Client, logger: Logger) -> Self {
        Self {
            http,
            token_url: settings.token_url(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            timeout: settings.timeout,
            safety_margin: settings.token_safety_margin,
            current: Mutex::new(None),
            logger: logger.child("oauth"),
        }
    }

    /// Returns the cached token while it is fresh, otherwise performs one grant.
    /// Concurrent callers queue on the lock and reuse the token the first caller obtained.
    pub async fn get_token(&self) -> Result<AccessToken, ApiError> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref() {
            if !token.is_expired() {
                return Ok(token.clone());
            }
        }
        *current = None;
        let token = self.grant().await?;
        *current = Some(token.clone());
        Ok(token)
    }

    /// Drops the cached token if it is still `stale`; a newer token is left alone.
    pub async fn invalidate(&self, stale: &AccessToken) {
        let mut current = self.current.lock().await;
        if current.as_ref().map(|t| t.same_as(stale)).unwrap_or(false) {
            self.logger.debug("Cached token invalidated", None);
            *current = None;
        }
    }

    async fn grant(&self) -> Result<AccessToken, ApiError> {
        self.logger.debug("Requesting OAuth2 token", None);
        let response = self
            .http
            .post(&self.token_url)
            .query(&[("grant_type", oauth::GRANT_TYPE)])
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                let mapped = ApiError::from(err);
                self.logger.warn(
                    "OAuth2 token request failed",
                    Some(&serde_json::json!({ "error": mapped.message })),
                );
                mapped
            })?;

        let status = response.status();
        let body = response.text().await.map_err(ApiError::from)?;
        if !status.is_success() {
            let detail = preview(
                &redact_text(&body, &[&self.client_secret]),
                limits::ERROR_BODY_PREVIEW_BYTES,
            );
            self.logger.error(
                "OAuth2 grant rejected",
                Some(&serde_json::json!({ "status": status.as_u16() })),
            );
            return Err(ApiError::auth(format!(
                "OAuth2 grant rejected with HTTP {}",
                status.as_u16()
            ))
            .with_status(status.as_u16())
            .with_hint("Check COBRANSAAS_CLIENT_ID and COBRANSAAS_CLIENT_SECRET")
            .with_details(serde_json::json!({ "body": detail })));
        }

        let parsed: GrantResponse = serde_json::from_str(&body).map_err(|err| {
            ApiError::auth("OAuth2 token response is not valid JSON")
                .with_details(serde_json::json!({ "decode": err.to_string() }))
        })?;
        let value = parsed
            .access_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::auth("OAuth2 token response has no access_token"))?;
        let expires_in = parse_expires_in(parsed.expires_in.as_ref());
        let token_type = parsed
            .token_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| oauth::DEFAULT_TOKEN_TYPE.to_string());

        let lifetime = Duration::from_secs(expires_in).saturating_sub(self.safety_margin);
        self.logger.info(
            "OAuth2 token granted",
            Some(&serde_json::json!({ "expires_in": expires_in })),
        );
        Ok(AccessToken {
            value,
            token_type,
            expires_at: Instant::now() + lifetime,
        })
    }
}

fn parse_expires_in(raw: Option<&Value>) -> u64 {
    match raw {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .unwrap_or(oauth::DEFAULT_EXPIRES_IN_SECS)
}
