use crate::constants::pagination;
use crate::errors::ApiError;
use crate::services::request_executor::{
    Effect, HttpMethod, Payload, RequestExecutor, RequestSpec,
};
use crate::services::tool_registry::{ToolHandler, ToolOutput};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

static SAFE_PATH_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("path value regex"));

pub type Args = Map<String, Value>;
pub type BodyBuilder = fn(&Args) -> Result<Option<Value>, ApiError>;

/// Maps a tool argument onto an upstream query parameter or body key.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub arg: &'static str,
    pub param: &'static str,
    /// Presence of this argument switches the request to CONTINUABLE mode.
    pub continuable_mode: bool,
}

impl Field {
    pub const fn new(arg: &'static str, param: &'static str) -> Self {
        Self {
            arg,
            param,
            continuable_mode: false,
        }
    }

    pub const fn same(name: &'static str) -> Self {
        Self::new(name, name)
    }

    pub const fn selector() -> Self {
        Self {
            arg: "selector",
            param: "selector",
            continuable_mode: true,
        }
    }
}

#[derive(Clone, Copy)]
pub enum BodyDef {
    None,
    /// Non-empty arguments copied under their upstream keys; nothing set means no body.
    Fields(&'static [Field]),
    Custom(BodyBuilder),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    Json,
    /// Single page; `size` and `continuable` arguments drive the cursor.
    Page,
    /// Every page concatenated.
    AllPages,
    /// First page only, at most `limit` items.
    Limited,
    Binary(&'static str),
}

/// A declarative description of one upstream endpoint exposed as a tool.
#[derive(Clone, Copy)]
pub struct OperationDef {
    pub name: &'static str,
    pub method: HttpMethod,
    pub path: &'static str,
    pub query: &'static [Field],
    pub body: BodyDef,
    pub shape: ResponseShape,
    pub effect: Effect,
}

impl OperationDef {
    pub const fn get(name: &'static str, path: &'static str) -> Self {
        Self {
            name,
            method: HttpMethod::Get,
            path,
            query: &[],
            body: BodyDef::None,
            shape: ResponseShape::Json,
            effect: Effect::Read,
        }
    }

    pub const fn post(name: &'static str, path: &'static str) -> Self {
        Self {
            method: HttpMethod::Post,
            effect: Effect::Write,
            ..Self::get(name, path)
        }
    }

    pub const fn query(mut self, fields: &'static [Field]) -> Self {
        self.query = fields;
        self
    }

    pub const fn body(mut self, body: BodyDef) -> Self {
        self.body = body;
        self
    }

    pub const fn shape(mut self, shape: ResponseShape) -> Self {
        self.shape = shape;
        self
    }

    pub const fn effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    /// Names of the `{placeholders}` in the path template, in order.
    pub fn path_params(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        let mut rest = self.path;
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            out.push(&rest[start + 1..start + len]);
            rest = &rest[start + len + 1..];
        }
        out
    }

    pub fn render_path(&self, args: &Args) -> Result<String, ApiError> {
        let mut path = self.path.to_string();
        for name in self.path_params() {
            let value = path_value(name, args.get(name))?;
            path = path.replace(&format!("{{{}}}", name), &value);
        }
        Ok(path)
    }

    /// Shapes validated arguments into the request, before any pagination parameters.
    pub fn build_request(&self, args: &Args) -> Result<RequestSpec, ApiError> {
        let path = self.render_path(args)?;
        let mut spec = match self.method {
            HttpMethod::Get => RequestSpec::get(path),
            HttpMethod::Post => RequestSpec::post(path),
        }
        .with_effect(self.effect);

        for field in self.query {
            if let Some(value) = args.get(field.arg).and_then(query_value) {
                spec.query.insert(field.param.to_string(), value);
                if field.continuable_mode {
                    spec.query.insert(
                        pagination::MODE_PARAM.to_string(),
                        pagination::MODE_CONTINUABLE.to_string(),
                    );
                }
            }
        }

        spec.body = match self.body {
            BodyDef::None => None,
            BodyDef::Fields(fields) => body_from_fields(fields, args),
            BodyDef::Custom(build) => build(args)?,
        };
        if matches!(self.shape, ResponseShape::Binary(_)) {
            spec = spec.binary();
        }
        Ok(spec)
    }
}

fn path_value(name: &str, value: Option<&Value>) -> Result<String, ApiError> {
    let rendered = match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
        Some(Value::Null) | None => {
            return Err(ApiError::validation(format!("Missing path parameter: {}", name)))
        }
        Some(_) => {
            return Err(ApiError::validation(format!(
                "Path parameter {} must be a string or integer",
                name
            )))
        }
    };
    if !SAFE_PATH_VALUE.is_match(&rendered) || rendered.chars().all(|c| c == '.') {
        return Err(ApiError::validation(format!(
            "Path parameter {} contains characters that are not allowed",
            name
        ))
        .with_hint("Use only letters, digits, '.', '_' and '-'")
        .with_details(serde_json::json!({ "field": name })));
    }
    Ok(rendered)
}

/// Absent, null and blank values are omitted.
pub fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().filter_map(query_value).collect();
            (!joined.is_empty()).then(|| joined.join(","))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(true) | Value::Number(_) => false,
    }
}

fn body_from_fields(fields: &[Field], args: &Args) -> Option<Value> {
    let mut body = Map::new();
    for field in fields {
        if let Some(value) = args.get(field.arg).filter(|v| !is_blank(v)) {
            body.insert(field.param.to_string(), value.clone());
        }
    }
    (!body.is_empty()).then_some(Value::Object(body))
}

fn int_arg(args: &Args, name: &str) -> Option<u64> {
    args.get(name).and_then(|v| v.as_u64())
}

/// A tool handler backed by one `OperationDef`.
pub struct ResourceOperation {
    def: &'static OperationDef,
    executor: Arc<RequestExecutor>,
}

impl ResourceOperation {
    pub fn new(def: &'static OperationDef, executor: Arc<RequestExecutor>) -> Self {
        Self { def, executor }
    }

    async fn run(&self, args: &Args, cancel: &CancellationToken) -> Result<ToolOutput, ApiError> {
        let spec = self.def.build_request(args)?;
        match self.def.shape {
            ResponseShape::Json => {
                let response = self.executor.execute(&spec, cancel).await?;
                match response.payload {
                    Payload::Json(value) => Ok(ToolOutput::Json(value)),
                    Payload::Binary { content_type, .. } => Err(ApiError::internal(format!(
                        "{} expected JSON, received {}",
                        self.def.name, content_type
                    ))),
                }
            }
            ResponseShape::Binary(declared) => {
                let response = self.executor.execute(&spec, cancel).await?;
                match response.payload {
                    Payload::Binary {
                        content_type,
                        bytes,
                    } => {
                        let content_type = if content_type.starts_with(declared) {
                            content_type
                        } else {
                            declared.to_string()
                        };
                        Ok(ToolOutput::Binary {
                            content_type,
                            bytes,
                        })
                    }
                    Payload::Json(_) => Err(ApiError::internal(format!(
                        "{} expected binary content",
                        self.def.name
                    ))),
                }
            }
            ResponseShape::Page => {
                let size = int_arg(args, "size").unwrap_or(pagination::PAGE_SIZE);
                let cursor = args.get("continuable").and_then(|v| v.as_str());
                let page = self.executor.fetch_page(&spec, size, cursor, cancel).await?;
                let value = serde_json::to_value(page)
                    .map_err(|err| ApiError::internal(err.to_string()))?;
                Ok(ToolOutput::Json(value))
            }
            ResponseShape::AllPages => {
                let items = self.executor.fetch_all(&spec, cancel).await?;
                Ok(ToolOutput::Json(items))
            }
            ResponseShape::Limited => {
                let limit = int_arg(args, "limit")
                    .unwrap_or(pagination::LIST_LIMIT)
                    .clamp(1, pagination::LIST_LIMIT_MAX);
                let spec = spec
                    .with_query("page", "0")
                    .with_query(pagination::SIZE_PARAM, limit.to_string());
                let response = self.executor.execute(&spec, cancel).await?;
                let value = match response.payload {
                    Payload::Json(Value::Array(mut items)) => {
                        items.truncate(limit as usize);
                        Value::Array(items)
                    }
                    Payload::Json(other) => other,
                    Payload::Binary { .. } => {
                        return Err(ApiError::internal(format!(
                            "{} expected JSON",
                            self.def.name
                        )))
                    }
                };
                Ok(ToolOutput::Json(value))
            }
        }
    }
}

#[async_trait]
impl ToolHandler for ResourceOperation {
    async fn handle(&self, args: Value, cancel: CancellationToken) -> Result<ToolOutput, ApiError> {
        let args = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ApiError::validation("Tool arguments must be an object")),
        };
        self.run(&args, &cancel).await
    }
}
