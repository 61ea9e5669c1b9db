use crate::errors::ApiError;
use crate::mcp::protocol::{CallToolResult, Content};
use crate::services::tool_registry::ToolOutput;
use base64::Engine;
use serde_json::Value;
use sha2::{Digest, Sha256};

pub fn tool_result(outcome: Result<ToolOutput, ApiError>) -> CallToolResult {
    match outcome {
        Ok(ToolOutput::Json(value)) => json_result(value),
        Ok(ToolOutput::Binary {
            content_type,
            bytes,
        }) => binary_result(&content_type, &bytes),
        Err(err) => error_result(&err),
    }
}

fn json_result(value: Value) -> CallToolResult {
    let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
    CallToolResult {
        content: vec![Content::text(text)],
        structured_content: Some(serde_json::json!({ "result": value })),
        is_error: false,
    }
}

fn binary_result(content_type: &str, bytes: &[u8]) -> CallToolResult {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    if content_type.starts_with("image/") {
        return CallToolResult {
            content: vec![Content::Image {
                data: encoded,
                mime_type: content_type.to_string(),
            }],
            structured_content: None,
            is_error: false,
        };
    }
    let document = serde_json::json!({
        "content_type": content_type,
        "bytes": bytes.len(),
        "sha256": hex::encode(Sha256::digest(bytes)),
        "data_base64": encoded,
    });
    json_result(document)
}

pub fn error_result(err: &ApiError) -> CallToolResult {
    let mut lines = vec![
        format!("Error [{}/{}]: {}", err.kind.as_str(), err.code, err.message),
    ];
    if let Some(status) = err.http_status {
        lines.push(format!("http_status: {}", status));
    }
    lines.push(format!("retriable: {}", err.retriable));
    if let Some(hint) = &err.hint {
        lines.push(format!("hint: {}", hint));
    }
    let structured = serde_json::to_value(err).unwrap_or_else(|_| {
        serde_json::json!({ "kind": err.kind.as_str(), "message": err.message })
    });
    CallToolResult {
        content: vec![Content::text(lines.join("\n"))],
        structured_content: Some(serde_json::json!({ "error": structured })),
        is_error: true,
    }
}
