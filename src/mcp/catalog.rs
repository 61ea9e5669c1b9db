use crate::constants::limits;
use crate::errors::ApiError;
use crate::utils::suggest::suggest;
use jsonschema::error::ValidationErrorKind;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

pub struct Catalog {
    tools: Vec<ToolDef>,
    validators: HashMap<String, JSONSchema>,
}

impl Catalog {
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let tools: Vec<ToolDef> =
            serde_json::from_str(raw).map_err(|err| format!("tool catalog is not valid JSON: {}", err))?;
        let mut validators = HashMap::new();
        for tool in &tools {
            let schema = JSONSchema::compile(&tool.input_schema)
                .map_err(|err| format!("schema of {} does not compile: {}", tool.name, err))?;
            if validators.insert(tool.name.clone(), schema).is_some() {
                return Err(format!("duplicate tool name in catalog: {}", tool.name));
            }
        }
        Ok(Self { tools, validators })
    }

    pub fn tools(&self) -> &[ToolDef] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDef> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Checks `args` against the tool's input schema, reporting every offending field.
    pub fn validate(&self, name: &str, args: &Value) -> Result<(), ApiError> {
        let (Some(tool), Some(schema)) = (self.get(name), self.validators.get(name)) else {
            return Err(ApiError::internal(format!("No input schema registered for {}", name)));
        };
        match schema.validate(args) {
            Ok(()) => Ok(()),
            Err(errors) => Err(schema_error(name, errors, &tool.input_schema)),
        }
    }
}

static CATALOG: Lazy<Result<Catalog, String>> = Lazy::new(|| {
    Catalog::from_json(include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tool_catalog.json"
    )))
});

pub fn tool_catalog() -> Result<&'static Catalog, ApiError> {
    CATALOG.as_ref().map_err(|err| ApiError::internal(err.clone()))
}

fn schema_error(tool: &str, errors: jsonschema::ErrorIterator, schema: &Value) -> ApiError {
    let known: Vec<String> = schema
        .get("properties")
        .and_then(|v| v.as_object())
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default();
    let mut problems = Vec::new();
    let mut did_you_mean = Vec::new();

    for err in errors.take(limits::MAX_SCHEMA_ERRORS) {
        let at = err.instance_path.to_string();
        let at = if at.is_empty() { "(root)".to_string() } else { at };
        match &err.kind {
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                for field in unexpected {
                    problems.push(format!("{}: unknown field '{}'", at, field));
                    let close = suggest(field, &known, 3);
                    if !close.is_empty() {
                        did_you_mean.push(format!("{} -> {}", field, close.join(", ")));
                    }
                }
            }
            ValidationErrorKind::Required { property } => {
                let field = property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string());
                problems.push(format!("{}: missing required field '{}'", at, field));
            }
            ValidationErrorKind::Enum { options } => {
                problems.push(format!("{}: expected one of {}", at, options));
            }
            _ => problems.push(format!("{}: {}", at, err)),
        }
    }

    let mut error = ApiError::validation(format!(
        "Invalid arguments for {}: {}",
        tool,
        problems.join("; ")
    ))
    .with_details(serde_json::json!({ "errors": problems, "did_you_mean": did_you_mean }));
    if !did_you_mean.is_empty() {
        error = error.with_hint(format!("Did you mean: {}", did_you_mean.join("; ")));
    }
    error
}
