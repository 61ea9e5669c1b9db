use crate::app::App;
use crate::errors::{ApiError, ErrorCode, McpError};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::services::logger::Logger;
use crate::settings::Settings;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const PROTOCOL_VERSION: &str = "2025-06-18";
pub const SERVER_NAME: &str = "cobransaas-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const OUTBOX_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("startup failed: {0}")]
    Startup(#[from] ApiError),
    #[error("stdio failure: {0}")]
    Io(#[from] std::io::Error),
}

type InFlight = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// JSON-RPC over newline-delimited stdio. Each `tools/call` runs on its own task;
/// a single writer task owns the output stream.
pub struct McpServer {
    app: Arc<App>,
    in_flight: InFlight,
    logger: Logger,
}

impl McpServer {
    pub fn new(app: Arc<App>) -> Self {
        let logger = app.logger.child("server");
        Self {
            app,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            logger,
        }
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })
    }

    fn handle_tools_list(&self) -> Value {
        serde_json::json!({ "tools": self.app.registry.catalog().tools() })
    }

    fn cancel_request(&self, params: &Value) {
        let Some(request_id) = params.get("requestId") else {
            return;
        };
        let key = request_key(request_id);
        let token = lock(&self.in_flight).get(&key).cloned();
        if let Some(token) = token {
            self.logger.info(
                "Cancelling tool call",
                Some(&serde_json::json!({ "request_id": request_id })),
            );
            token.cancel();
        }
    }

    fn spawn_tool_call(&self, id: Value, params: &Value, outbox: mpsc::Sender<String>) {
        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        if name.is_empty() {
            let response = JsonRpcResponse::failure(
                id,
                ErrorCode::InvalidParams.as_i32(),
                "Missing tool name".to_string(),
            );
            tokio::spawn(async move {
                let _ = outbox.send(encode(&response)).await;
            });
            return;
        }
        let args = params.get("arguments").cloned().unwrap_or(Value::Null);

        let key = request_key(&id);
        let token = CancellationToken::new();
        lock(&self.in_flight).insert(key.clone(), token.clone());

        let registry = self.app.registry.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            let result = registry.invoke(&name, args, token.clone()).await;
            lock(&in_flight).remove(&key);
            // A cancelled request gets no response.
            if token.is_cancelled() {
                return;
            }
            let result = serde_json::to_value(&result).unwrap_or_else(|err| {
                serde_json::json!({
                    "content": [{"type": "text", "text": format!("Failed to encode result: {}", err)}],
                    "isError": true,
                })
            });
            let _ = outbox
                .send(encode(&JsonRpcResponse::success(id, result)))
                .await;
        });
    }

    fn handle_request(&self, request: JsonRpcRequest, outbox: &mpsc::Sender<String>) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            let err = McpError::invalid_request();
            return Some(JsonRpcResponse::failure(
                request.id.unwrap_or(Value::Null),
                err.code.as_i32(),
                err.message,
            ));
        }
        match request.method.as_str() {
            "notifications/cancelled" => {
                self.cancel_request(&request.params);
                None
            }
            method if method.starts_with("notifications/") => None,
            "initialize" => request
                .id
                .map(|id| JsonRpcResponse::success(id, self.handle_initialize())),
            "ping" => request
                .id
                .map(|id| JsonRpcResponse::success(id, serde_json::json!({}))),
            "tools/list" => request
                .id
                .map(|id| JsonRpcResponse::success(id, self.handle_tools_list())),
            "tools/call" => {
                if let Some(id) = request.id {
                    self.spawn_tool_call(id, &request.params, outbox.clone());
                }
                None
            }
            other => request.id.map(|id| {
                let err = McpError::method_not_found(other);
                JsonRpcResponse::failure(id, err.code.as_i32(), err.message)
            }),
        }
    }

    /// Serves until the input stream closes, then waits for in-flight calls to answer.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), ServerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbox, mut inbox) = mpsc::channel::<String>(OUTBOX_CAPACITY);
        let writer_task = tokio::spawn(async move {
            let mut writer = BufWriter::new(writer);
            while let Some(line) = inbox.recv().await {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<(), std::io::Error>(())
        });

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let response = match serde_json::from_str::<Value>(trimmed) {
                Err(_) => {
                    let err = McpError::parse_error();
                    Some(JsonRpcResponse::failure(Value::Null, err.code.as_i32(), err.message))
                }
                Ok(value) => {
                    let id = value.get("id").cloned().unwrap_or(Value::Null);
                    match serde_json::from_value::<JsonRpcRequest>(value) {
                        Ok(request) => self.handle_request(request, &outbox),
                        Err(_) => {
                            let err = McpError::invalid_request();
                            Some(JsonRpcResponse::failure(id, err.code.as_i32(), err.message))
                        }
                    }
                }
            };
            if let Some(response) = response {
                if outbox.send(encode(&response)).await.is_err() {
                    break;
                }
            }
        }

        drop(outbox);
        match writer_task.await {
            Ok(result) => result?,
            Err(err) => {
                self.logger
                    .error("Writer task failed", Some(&serde_json::json!({ "error": err.to_string() })));
            }
        }
        Ok(())
    }
}

fn request_key(id: &Value) -> String {
    id.to_string()
}

fn lock(map: &InFlight) -> std::sync::MutexGuard<'_, HashMap<String, CancellationToken>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn encode(response: &JsonRpcResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|_| {
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#
            .to_string()
    })
}

pub async fn run_stdio(settings: Settings) -> Result<(), ServerError> {
    let app = Arc::new(App::initialize(settings)?);
    app.logger.info(
        "Server ready",
        Some(&serde_json::json!({
            "tools": app.registry.catalog().tools().len(),
            "host": app.settings.host.as_str(),
        })),
    );
    let server = McpServer::new(app);
    server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
}
