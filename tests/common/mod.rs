#![allow(dead_code)]

use cobransaas_mcp::app::App;
use cobransaas_mcp::services::logger::Logger;
use cobransaas_mcp::services::token_manager::TokenManager;
use cobransaas_mcp::settings::Settings;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use wiremock::matchers::{basic_auth, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub const CLIENT_ID: &str = "assessoria-app";
pub const CLIENT_SECRET: &str = "s3cr3t-client-value";
pub const API: &str = "/api/assessorias";

pub fn api_path(suffix: &str) -> String {
    format!("{}{}", API, suffix)
}

/// Settings against the mock server with millisecond backoff and no rate limiting.
pub fn fast_settings(server: &MockServer) -> Settings {
    let mut settings = Settings::new(&server.uri(), CLIENT_ID, CLIENT_SECRET).expect("settings");
    settings.retry_base_delay = Duration::from_millis(5);
    settings.retry_max_delay = Duration::from_millis(40);
    settings.rate_limit_per_second = 0;
    settings.timeout = Duration::from_secs(5);
    settings
}

pub fn app(settings: Settings) -> App {
    App::initialize(settings).expect("app wiring")
}

pub fn token_manager(settings: &Settings) -> TokenManager {
    TokenManager::new(settings, reqwest::Client::new(), Logger::new("test"))
}

fn token_mock() -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(query_param("grant_type", "client_credentials"))
        .and(basic_auth(CLIENT_ID, CLIENT_SECRET))
}

/// Grants `tok-1`, `tok-2`, ... in order, each valid for `expires_in` seconds.
pub async fn mount_token_endpoint(server: &MockServer, expires_in: u64) -> Arc<AtomicUsize> {
    let grants = Arc::new(AtomicUsize::new(0));
    let counter = grants.clone();
    token_mock()
        .respond_with(move |_: &Request| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": format!("tok-{}", n),
                "token_type": "Bearer",
                "expires_in": expires_in,
            }))
        })
        .mount(server)
        .await;
    grants
}

pub async fn mount_token_endpoint_with_delay(server: &MockServer, delay: Duration) {
    token_mock()
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok-1", "expires_in": 3600}))
                .set_delay(delay),
        )
        .expect(1)
        .mount(server)
        .await;
}

pub async fn api_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().starts_with(API))
        .collect()
}

pub fn structured_result(result: &cobransaas_mcp::mcp::protocol::CallToolResult) -> Value {
    result
        .structured_content
        .as_ref()
        .map(|v| v["result"].clone())
        .unwrap_or(Value::Null)
}

pub fn structured_error(result: &cobransaas_mcp::mcp::protocol::CallToolResult) -> Value {
    result
        .structured_content
        .as_ref()
        .map(|v| v["error"].clone())
        .unwrap_or(Value::Null)
}
