use crate::constants::{limits, pagination};
use crate::errors::ApiError;
use crate::services::logger::Logger;
use crate::services::rate_limiter::RateLimiter;
use crate::services::token_manager::{AccessToken, TokenManager};
use crate::settings::Settings;
use crate::utils::redact::redact_text;
use crate::utils::text::preview;
use bytes::Bytes;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

/// Whether repeating the request can change upstream state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Json,
    Binary,
}

/// One upstream call, relative to the API base URL.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub expect: Expect,
    pub effect: Effect,
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: BTreeMap::new(),
            body: None,
            expect: Expect::Json,
            effect: Effect::Read,
        }
    }

    /// POST defaults to a write; override with `with_effect` for side-effect free calls.
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            effect: Effect::Write,
            ..Self::get(path)
        }
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.insert(key.to_string(), value.into());
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    pub fn binary(mut self) -> Self {
        self.expect = Expect::Binary;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Binary { content_type: String, bytes: Bytes },
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub payload: Payload,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub data: Value,
    pub has_next: bool,
    pub continuable: Option<String>,
    pub current_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
    pub retry_writes: bool,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: settings.retry_base_delay,
            max_delay: settings.retry_max_delay,
            jitter: settings.retry_jitter,
            retry_writes: settings.retry_writes,
        }
    }

    /// Exponential delay before retry number `retry` (1-based), capped, without jitter.
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let scaled = self.base_delay.saturating_mul(1u32 << exponent);
        scaled.min(self.max_delay)
    }

    /// Base delay plus additive jitter in `[0, jitter * delay)`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let delay = self.base_delay_for(retry);
        if self.jitter <= 0.0 {
            return delay;
        }
        let extra = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
        delay + Duration::from_secs_f64(extra)
    }

    fn allows_transient_retry(&self, effect: Effect) -> bool {
        effect == Effect::Read || self.retry_writes
    }
}

enum Attempt {
    Done(ApiResponse),
    Unauthorized { token: AccessToken, status: u16 },
    /// `sent` is false when the failure happened before the request left this process.
    Transient {
        error: ApiError,
        retry_after: Option<Duration>,
        sent: bool,
    },
    Fatal(ApiError),
}

/// Authenticated HTTP execution with retry, backoff and error classification.
pub struct RequestExecutor {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_pages: u32,
    policy: RetryPolicy,
    tokens: Arc<TokenManager>,
    limiter: Arc<RateLimiter>,
    logger: Logger,
}

impl RequestExecutor {
    pub fn new(
        settings: &Settings,
        http: reqwest::Client,
        tokens: Arc<TokenManager>,
        limiter: Arc<RateLimiter>,
        logger: Logger,
    ) -> Self {
        Self {
            http,
            base_url: settings.api_base_url(),
            timeout: settings.timeout,
            max_pages: settings.max_pages,
            policy: RetryPolicy::from_settings(settings),
            tokens,
            limiter,
            logger: logger.child("executor"),
        }
    }

    pub async fn execute(
        &self,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        let mut failures: u32 = 0;
        let mut refreshed = false;

        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::cancelled());
            }
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::cancelled()),
                outcome = self.attempt(spec) => outcome,
            };

            match outcome {
                Attempt::Done(response) => return Ok(response),
                Attempt::Fatal(err) => return Err(err),
                Attempt::Unauthorized { token, status } => {
                    if refreshed {
                        return Err(ApiError::auth(format!(
                            "Upstream rejected a freshly granted token (HTTP {})",
                            status
                        ))
                        .with_status(status)
                        .with_hint("The credentials may lack permission for this resource"));
                    }
                    refreshed = true;
                    self.logger.info(
                        "Token rejected, refreshing once",
                        Some(&serde_json::json!({ "status": status, "path": spec.path })),
                    );
                    self.tokens.invalidate(&token).await;
                }
                Attempt::Transient {
                    error,
                    retry_after,
                    sent,
                } => {
                    if sent && !self.policy.allows_transient_retry(spec.effect) {
                        return Err(error.with_retriable(false).with_hint(
                            "Write request failed in transit; its outcome is unknown. Verify upstream state before repeating it",
                        ));
                    }
                    failures += 1;
                    if failures > self.policy.max_retries {
                        let message =
                            format!("{} (after {} attempts)", error.message, failures);
                        return Err(ApiError {
                            message,
                            ..error
                        }
                        .with_retriable(true));
                    }
                    let mut delay = self.policy.backoff_delay(failures);
                    if let Some(hint) = retry_after {
                        delay = delay.max(hint.min(self.policy.max_delay));
                    }
                    self.logger.warn(
                        "Retrying upstream request",
                        Some(&serde_json::json!({
                            "method": spec.method.as_str(),
                            "path": spec.path,
                            "retry": failures,
                            "delay_ms": delay.as_millis() as u64,
                            "reason": error.message,
                        })),
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ApiError::cancelled()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn attempt(&self, spec: &RequestSpec) -> Attempt {
        self.limiter.acquire().await;
        let token = match self.tokens.get_token().await {
            Ok(token) => token,
            Err(error) if error.retriable => {
                return Attempt::Transient {
                    error,
                    retry_after: None,
                    sent: false,
                }
            }
            Err(error) => return Attempt::Fatal(error),
        };

        let url = format!("{}{}", self.base_url, spec.path);
        let mut request = self
            .http
            .request(spec.method.to_reqwest(), &url)
            .header(AUTHORIZATION, token.authorization())
            .timeout(self.timeout);
        if spec.expect == Expect::Json {
            request = request.header(ACCEPT, "application/json");
        }
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        self.logger.debug(
            "Upstream request",
            Some(&serde_json::json!({ "method": spec.method.as_str(), "path": spec.path })),
        );
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                let sent = !err.is_connect();
                return classify_transport(ApiError::from(err), sent);
            }
        };

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Attempt::Unauthorized { token, status };
        }
        if status == 429 || (500..600).contains(&status) {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            let error = ApiError::upstream(format!("Upstream returned HTTP {}", status))
                .with_status(status)
                .with_details(serde_json::json!({ "body": self.body_preview(&body) }));
            return Attempt::Transient {
                error,
                retry_after,
                sent: true,
            };
        }
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&body)
                .unwrap_or_else(|| format!("Upstream returned HTTP {}", status));
            return Attempt::Fatal(
                ApiError::client(status, redact_text(&message, &[]))
                    .with_details(serde_json::json!({ "body": self.body_preview(&body) })),
            );
        }

        let headers = response.headers().clone();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return classify_transport(ApiError::from(err), true),
        };
        let payload = match spec.expect {
            Expect::Json => match decode_json(&bytes) {
                Ok(value) => Payload::Json(value),
                Err(err) => return Attempt::Fatal(err.with_status(status)),
            },
            Expect::Binary => Payload::Binary {
                content_type: headers
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("application/octet-stream")
                    .to_string(),
                bytes,
            },
        };
        Attempt::Done(ApiResponse {
            status,
            headers,
            payload,
        })
    }

    /// Fetches one page in CONTINUABLE mode.
    pub async fn fetch_page(
        &self,
        spec: &RequestSpec,
        size: u64,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Page, ApiError> {
        let mut spec = spec.clone();
        spec.query.insert(
            pagination::MODE_PARAM.to_string(),
            pagination::MODE_CONTINUABLE.to_string(),
        );
        spec.query
            .insert(pagination::SIZE_PARAM.to_string(), size.to_string());
        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            spec.query
                .insert(pagination::CURSOR_PARAM.to_string(), cursor.to_string());
        }

        let response = self.execute(&spec, cancel).await?;
        let meta = PageMeta::from_headers(&response.headers);
        Ok(Page {
            data: json_payload(response.payload)?,
            has_next: meta.has_next,
            continuable: meta.continuable,
            current_size: meta.current_size,
        })
    }

    /// Follows the continuation cursor and concatenates every page, up to `max_pages`.
    pub async fn fetch_all(
        &self,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let mut spec = spec.clone();
        spec.query.insert(
            pagination::MODE_PARAM.to_string(),
            pagination::MODE_CONTINUABLE.to_string(),
        );
        let mut items = Vec::new();

        for page in 1..=self.max_pages {
            let response = self.execute(&spec, cancel).await?;
            let meta = PageMeta::from_headers(&response.headers);
            match json_payload(response.payload)? {
                Value::Array(values) => items.extend(values),
                Value::Null => {}
                other => items.push(other),
            }
            let cursor = match meta.continuable {
                Some(cursor) if meta.has_next && !cursor.is_empty() => cursor,
                _ => return Ok(Value::Array(items)),
            };
            if page == self.max_pages {
                self.logger.warn(
                    "Pagination stopped at page limit",
                    Some(&serde_json::json!({ "path": spec.path, "max_pages": self.max_pages })),
                );
                break;
            }
            spec.query
                .insert(pagination::CURSOR_PARAM.to_string(), cursor);
        }
        Ok(Value::Array(items))
    }

    fn body_preview(&self, body: &str) -> String {
        preview(&redact_text(body, &[]), limits::ERROR_BODY_PREVIEW_BYTES)
    }
}

fn classify_transport(error: ApiError, sent: bool) -> Attempt {
    if error.retriable {
        Attempt::Transient {
            error,
            retry_after: None,
            sent,
        }
    } else {
        Attempt::Fatal(error)
    }
}

fn json_payload(payload: Payload) -> Result<Value, ApiError> {
    match payload {
        Payload::Json(value) => Ok(value),
        Payload::Binary { content_type, .. } => Err(ApiError::internal(format!(
            "Expected a JSON page, received {}",
            content_type
        ))),
    }
}

fn decode_json(bytes: &[u8]) -> Result<Value, ApiError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|err| {
        let body = String::from_utf8_lossy(bytes);
        ApiError::decode(format!("Upstream response is not valid JSON: {}", err)).with_details(
            serde_json::json!({ "body": preview(&body, limits::ERROR_BODY_PREVIEW_BYTES) }),
        )
    })
}

struct PageMeta {
    has_next: bool,
    continuable: Option<String>,
    current_size: Option<u64>,
}

impl PageMeta {
    fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            has_next: text(pagination::HEADER_HAS_NEXT)
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            continuable: text(pagination::HEADER_CONTINUABLE),
            current_size: text(pagination::HEADER_CURRENT_SIZE).and_then(|v| v.parse().ok()),
        }
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Picks the human-readable message out of an upstream error body, falling back to
/// the truncated body text.
pub fn extract_error_message(body: &str) -> Option<String> {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        let object = value.as_object()?;
        ["message", "mensagem", "error", "detail"]
            .iter()
            .filter_map(|key| object.get(*key))
            .find_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
    });
    from_json.or_else(|| {
        let text = body.trim();
        (!text.is_empty()).then(|| preview(text, limits::ERROR_BODY_PREVIEW_BYTES))
    })
}
