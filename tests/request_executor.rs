mod common;

use cobransaas_mcp::errors::ApiErrorKind;
use cobransaas_mcp::services::request_executor::{Payload, RequestSpec};
use common::{api_path, api_requests, app, fast_settings, mount_token_endpoint};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn sends_bearer_token_and_returns_json() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 3600).await;
    Mock::given(method("GET"))
        .and(path(api_path("/global")))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dataProcessamento": "2024-05-02"})))
        .expect(1)
        .mount(&server)
        .await;
    let app = app(fast_settings(&server));

    let response = app
        .executor
        .execute(&RequestSpec::get("/global"), &CancellationToken::new())
        .await
        .expect("response");
    assert_eq!(response.status, 200);
    match response.payload {
        Payload::Json(value) => assert_eq!(value["dataProcessamento"], "2024-05-02"),
        other => panic!("unexpected payload {:?}", other),
    }
}

#[tokio::test]
async fn persistent_5xx_is_attempted_max_retries_plus_one_times() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 3600).await;
    Mock::given(method("GET"))
        .and(path(api_path("/parcelas/1")))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;
    let app = app(fast_settings(&server));

    let err = app
        .executor
        .execute(&RequestSpec::get("/parcelas/1"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Upstream);
    assert_eq!(err.http_status, Some(502));
    assert!(err.retriable);
    assert!(err.message.contains("after 4 attempts"), "{}", err.message);
}

#[tokio::test]
async fn transient_failures_then_success_returns_the_success() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 3600).await;
    Mock::given(method("GET"))
        .and(path(api_path("/parcelas/7")))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("/parcelas/7")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .expect(1)
        .mount(&server)
        .await;
    let app = app(fast_settings(&server));

    let response = app
        .executor
        .execute(&RequestSpec::get("/parcelas/7"), &CancellationToken::new())
        .await
        .expect("success after retries");
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn too_many_requests_is_retried() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 3600).await;
    Mock::given(method("GET"))
        .and(path(api_path("/boletos/1")))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("/boletos/1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;
    let app = app(fast_settings(&server));

    app.executor
        .execute(&RequestSpec::get("/boletos/1"), &CancellationToken::new())
        .await
        .expect("retried after 429");
    assert_eq!(api_requests(&server).await.len(), 2);
}

#[tokio::test]
async fn not_found_is_a_client_error_without_retries() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 3600).await;
    Mock::given(method("GET"))
        .and(path(api_path("/clientes/999")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"mensagem": "Cliente não encontrado"})))
        .expect(1)
        .mount(&server)
        .await;
    let app = app(fast_settings(&server));

    let err = app
        .executor
        .execute(&RequestSpec::get("/clientes/999"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Client);
    assert_eq!(err.http_status, Some(404));
    assert_eq!(err.message, "Cliente não encontrado");
    assert!(!err.retriable);
}

#[tokio::test]
async fn unauthorized_refreshes_token_exactly_once() {
    let server = MockServer::start().await;
    let grants = mount_token_endpoint(&server, 3600).await;
    Mock::given(method("GET"))
        .and(path(api_path("/contratos/3")))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("/contratos/3")))
        .and(header("authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3})))
        .expect(1)
        .mount(&server)
        .await;
    let app = app(fast_settings(&server));

    app.executor
        .execute(&RequestSpec::get("/contratos/3"), &CancellationToken::new())
        .await
        .expect("success with refreshed token");
    assert_eq!(grants.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn second_unauthorized_is_a_non_retriable_auth_error() {
    let server = MockServer::start().await;
    let grants = mount_token_endpoint(&server, 3600).await;
    Mock::given(method("GET"))
        .and(path(api_path("/acordos/8")))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;
    let app = app(fast_settings(&server));

    let err = app
        .executor
        .execute(&RequestSpec::get("/acordos/8"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Auth);
    assert_eq!(err.http_status, Some(403));
    assert!(!err.retriable);
    assert_eq!(grants.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn write_hitting_503_is_attempted_once() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 3600).await;
    Mock::given(method("POST"))
        .and(path(api_path("/boletos/5/registrar")))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    let app = app(fast_settings(&server));

    let err = app
        .executor
        .execute(&RequestSpec::post("/boletos/5/registrar"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Upstream);
    assert!(!err.retriable);
    assert!(err.hint.unwrap_or_default().contains("outcome is unknown"));
}

#[tokio::test]
async fn write_retries_follow_policy_when_enabled() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 3600).await;
    Mock::given(method("POST"))
        .and(path(api_path("/pix/1/registrar")))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    let mut settings = fast_settings(&server);
    settings.retry_writes = true;
    settings.max_retries = 2;
    let app = app(settings);

    let err = app
        .executor
        .execute(&RequestSpec::post("/pix/1/registrar"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.retriable);
}

#[tokio::test]
async fn cancellation_during_backoff_stops_further_attempts() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 3600).await;
    Mock::given(method("GET"))
        .and(path(api_path("/lotes/1")))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    let mut settings = fast_settings(&server);
    settings.retry_base_delay = Duration::from_secs(10);
    settings.retry_max_delay = Duration::from_secs(10);
    let app = app(settings);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = app
        .executor
        .execute(&RequestSpec::get("/lotes/1"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn empty_success_body_is_null_and_garbage_is_a_decode_error() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 3600).await;
    Mock::given(method("POST"))
        .and(path(api_path("/acordos/1/ativar")))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("/global")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;
    let app = app(fast_settings(&server));

    let response = app
        .executor
        .execute(&RequestSpec::post("/acordos/1/ativar"), &CancellationToken::new())
        .await
        .expect("no content");
    assert!(matches!(response.payload, Payload::Json(serde_json::Value::Null)));

    let err = app
        .executor
        .execute(&RequestSpec::get("/global"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Decode);
}

#[tokio::test]
async fn continuation_cursor_yields_next_page_without_overlap() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 3600).await;
    Mock::given(method("GET"))
        .and(path(api_path("/lotes/4/registros")))
        .and(query_param("mode", "CONTINUABLE"))
        .and(query_param("size", "2"))
        .and(query_param_is_missing("continuable"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": 1}, {"id": 2}]))
                .insert_header("x-meta-has-next", "true")
                .insert_header("x-meta-continuable", "cursor-2")
                .insert_header("x-meta-current-size", "2"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("/lotes/4/registros")))
        .and(query_param("continuable", "cursor-2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": 3}]))
                .insert_header("x-meta-has-next", "false")
                .insert_header("x-meta-current-size", "1"),
        )
        .mount(&server)
        .await;
    let app = app(fast_settings(&server));
    let spec = RequestSpec::get("/lotes/4/registros");
    let cancel = CancellationToken::new();

    let first = app.executor.fetch_page(&spec, 2, None, &cancel).await.expect("page 1");
    assert!(first.has_next);
    assert_eq!(first.current_size, Some(2));
    let cursor = first.continuable.clone().expect("cursor");
    let second = app
        .executor
        .fetch_page(&spec, 2, Some(&cursor), &cancel)
        .await
        .expect("page 2");
    assert!(!second.has_next);

    let mut ids: Vec<i64> = first.data.as_array().into_iter().flatten()
        .chain(second.data.as_array().into_iter().flatten())
        .filter_map(|item| item["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn fetch_all_concatenates_pages() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 3600).await;
    Mock::given(method("GET"))
        .and(path(api_path("/tabulacoes")))
        .and(query_param_is_missing("continuable"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": "a"}]))
                .insert_header("x-meta-has-next", "true")
                .insert_header("x-meta-continuable", "next"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("/tabulacoes")))
        .and(query_param("continuable", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "b"}, {"id": "c"}])))
        .expect(1)
        .mount(&server)
        .await;
    let app = app(fast_settings(&server));

    let all = app
        .executor
        .fetch_all(&RequestSpec::get("/tabulacoes"), &CancellationToken::new())
        .await
        .expect("all pages");
    assert_eq!(all, json!([{"id": "a"}, {"id": "b"}, {"id": "c"}]));
}

#[tokio::test]
async fn fetch_all_stops_at_page_limit() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 3600).await;
    Mock::given(method("GET"))
        .and(path(api_path("/comissoes")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": 1}]))
                .insert_header("x-meta-has-next", "true")
                .insert_header("x-meta-continuable", "forever"),
        )
        .expect(3)
        .mount(&server)
        .await;
    let mut settings = fast_settings(&server);
    settings.max_pages = 3;
    let app = app(settings);

    let all = app
        .executor
        .fetch_all(&RequestSpec::get("/comissoes"), &CancellationToken::new())
        .await
        .expect("bounded");
    assert_eq!(all.as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn plain_text_client_error_body_becomes_the_message() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 3600).await;
    Mock::given(method("POST"))
        .and(path(api_path("/acordos/12/ativar")))
        .respond_with(ResponseTemplate::new(422).set_body_string("Contrato bloqueado para acordo"))
        .expect(1)
        .mount(&server)
        .await;
    let app = app(fast_settings(&server));

    let err = app
        .executor
        .execute(&RequestSpec::post("/acordos/12/ativar"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Client);
    assert_eq!(err.http_status, Some(422));
    assert_eq!(err.message, "Contrato bloqueado para acordo");
}

#[tokio::test]
async fn write_is_retried_when_token_grant_times_out_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "slow", "expires_in": 3600}))
                .set_delay(Duration::from_secs(2)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    let grants = mount_token_endpoint(&server, 3600).await;
    Mock::given(method("POST"))
        .and(path(api_path("/boletos/5/registrar")))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"registrado": true})))
        .expect(1)
        .mount(&server)
        .await;
    let mut settings = fast_settings(&server);
    settings.timeout = Duration::from_millis(300);
    let app = app(settings);

    let response = app
        .executor
        .execute(&RequestSpec::post("/boletos/5/registrar"), &CancellationToken::new())
        .await
        .expect("write succeeds once a token is granted");
    assert_eq!(response.status, 200);
    assert_eq!(grants.load(Ordering::SeqCst), 1);
    assert_eq!(api_requests(&server).await.len(), 1);
}
