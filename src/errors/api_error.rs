use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// Credential grant rejected, or the upstream kept refusing a fresh token.
    Auth,
    /// Well-formed request rejected by the upstream (404, 422, ...).
    Client,
    /// Transport failure, 429 or 5xx.
    Upstream,
    /// 2xx response whose body does not match the declared shape.
    Decode,
    /// Tool input does not conform to its schema.
    Validation,
    UnknownTool,
    Cancelled,
    /// Wiring or configuration fault inside this process.
    Internal,
}

impl ApiErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiErrorKind::Auth => "auth",
            ApiErrorKind::Client => "client",
            ApiErrorKind::Upstream => "upstream",
            ApiErrorKind::Decode => "decode",
            ApiErrorKind::Validation => "validation",
            ApiErrorKind::UnknownTool => "unknown_tool",
            ApiErrorKind::Cancelled => "cancelled",
            ApiErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, Serialize, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub retriable: bool,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            http_status: None,
            message: message.into(),
            hint: None,
            details: None,
            retriable: matches!(kind, ApiErrorKind::Upstream),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_retriable(mut self, retriable: bool) -> Self {
        self.retriable = retriable;
        self
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Auth, "AUTH_FAILED", message)
    }

    pub fn client(status: u16, message: impl Into<String>) -> Self {
        let code = match status {
            400 => "BAD_REQUEST",
            404 => "NOT_FOUND",
            409 => "CONFLICT",
            422 => "UNPROCESSABLE",
            _ => "CLIENT_ERROR",
        };
        Self::new(ApiErrorKind::Client, code, message).with_status(status)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Upstream, "UPSTREAM_UNAVAILABLE", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Upstream, "TIMEOUT", message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Decode, "DECODE_FAILED", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Validation, "INVALID_PARAMS", message)
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(
            ApiErrorKind::UnknownTool,
            "UNKNOWN_TOOL",
            format!("Unknown tool: {}", name),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ApiErrorKind::Cancelled, "CANCELLED", "Call cancelled by the caller")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Internal, "INTERNAL", message)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ApiError::timeout("HTTP request timed out");
        }
        if err.is_decode() {
            return ApiError::decode(format!("Failed to read response body: {}", err));
        }
        // URL and header errors are reported the same way; the message carries the cause.
        ApiError::upstream(format!("HTTP transport failure: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_upstream_errors_default_to_retriable() {
        assert!(ApiError::upstream("boom").retriable);
        assert!(ApiError::timeout("slow").retriable);
        assert!(!ApiError::auth("nope").retriable);
        assert!(!ApiError::client(404, "missing").retriable);
        assert!(!ApiError::decode("garbage").retriable);
        assert!(!ApiError::validation("bad").retriable);
        assert!(!ApiError::cancelled().retriable);
    }

    #[test]
    fn client_error_carries_status_and_code() {
        let err = ApiError::client(404, "Parcela not found");
        assert_eq!(err.http_status, Some(404));
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.kind, ApiErrorKind::Client);
    }

    #[test]
    fn serializes_kind_in_snake_case_and_skips_empty_fields() {
        let err = ApiError::unknown_tool("get_clent");
        let value = serde_json::to_value(&err).expect("serialize");
        assert_eq!(value["kind"], "unknown_tool");
        assert!(value.get("http_status").is_none());
        assert!(value.get("hint").is_none());
        assert_eq!(value["retriable"], false);
    }
}
