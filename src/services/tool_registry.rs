use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::ApiError;
use crate::mcp::catalog::Catalog;
use crate::mcp::envelope::tool_result;
use crate::mcp::protocol::CallToolResult;
use crate::services::logger::Logger;
use crate::utils::suggest::suggest;

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Json(Value),
    Binary { content_type: String, bytes: Bytes },
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value, cancel: CancellationToken) -> Result<ToolOutput, ApiError>;
}

/// Name to handler table, built once at startup and read-only afterwards.
#[derive(Clone)]
pub struct ToolRegistry {
    logger: Logger,
    catalog: &'static Catalog,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolRegistry {
    pub fn new(
        logger: Logger,
        catalog: &'static Catalog,
        handlers: HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Self {
        Self {
            logger: logger.child("registry"),
            catalog,
            handlers: Arc::new(handlers),
        }
    }

    pub fn catalog(&self) -> &'static Catalog {
        self.catalog
    }

    #[cfg(test)]
    pub(crate) fn has_tool(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Runs a tool and always produces a protocol result; failures come back with `isError`.
    pub async fn invoke(&self, name: &str, args: Value, cancel: CancellationToken) -> CallToolResult {
        let started = Instant::now();
        let outcome = self.dispatch(name, args, cancel).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => self.logger.info(
                "Tool call completed",
                Some(&serde_json::json!({ "tool": name, "duration_ms": elapsed_ms })),
            ),
            Err(err) => self.logger.warn(
                "Tool call failed",
                Some(&serde_json::json!({
                    "tool": name,
                    "duration_ms": elapsed_ms,
                    "kind": err.kind.as_str(),
                    "code": err.code,
                    "http_status": err.http_status,
                })),
            ),
        }
        tool_result(outcome)
    }

    /// Lookup, schema validation and dispatch. Nothing reaches the network unless
    /// the tool exists and its arguments conform.
    pub async fn dispatch(
        &self,
        name: &str,
        args: Value,
        cancel: CancellationToken,
    ) -> Result<ToolOutput, ApiError> {
        let Some(handler) = self.handlers.get(name) else {
            return Err(self.unknown_tool(name));
        };
        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };
        self.catalog.validate(name, &args)?;
        self.logger.debug("Dispatching tool", Some(&serde_json::json!({ "tool": name })));
        handler.handle(args, cancel).await
    }

    fn unknown_tool(&self, name: &str) -> ApiError {
        let mut known: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        known.sort_unstable();
        let suggestions = suggest(name, &known, 3);
        let mut error = ApiError::unknown_tool(name)
            .with_details(serde_json::json!({ "did_you_mean": suggestions }));
        if !suggestions.is_empty() {
            error = error.with_hint(format!("Did you mean: {}", suggestions.join(", ")));
        }
        error
    }
}
