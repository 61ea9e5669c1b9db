use crate::constants::network;
use crate::errors::ApiError;
use crate::managers;
use crate::mcp::catalog::{tool_catalog, Catalog};
use crate::services::logger::Logger;
use crate::services::operation::ResourceOperation;
use crate::services::rate_limiter::RateLimiter;
use crate::services::request_executor::RequestExecutor;
use crate::services::token_manager::TokenManager;
use crate::services::tool_registry::{ToolHandler, ToolRegistry};
use crate::settings::Settings;
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub settings: Settings,
    pub tokens: Arc<TokenManager>,
    pub executor: Arc<RequestExecutor>,
    pub registry: ToolRegistry,
}

impl App {
    /// Every catalog tool needs a handler, every handler a catalog entry, and every
    /// path placeholder a required schema property.
    fn validate_tool_wiring(
        catalog: &Catalog,
        handlers: &HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Result<(), ApiError> {
        let mut missing: Vec<String> = catalog
            .names()
            .into_iter()
            .filter(|name| !handlers.contains_key(*name))
            .map(str::to_string)
            .collect();
        let mut orphaned: Vec<String> = handlers
            .keys()
            .filter(|name| catalog.get(name).is_none())
            .cloned()
            .collect();
        let mut undeclared = Vec::new();
        for op in managers::all_operations() {
            let Some(tool) = catalog.get(op.name) else {
                continue;
            };
            let required = tool.input_schema["required"].as_array();
            for param in op.path_params() {
                let declared = required
                    .map(|r| r.iter().any(|v| v.as_str() == Some(param)))
                    .unwrap_or(false);
                if !declared {
                    undeclared.push(format!("{}.{}", op.name, param));
                }
            }
        }
        if missing.is_empty() && orphaned.is_empty() && undeclared.is_empty() {
            return Ok(());
        }
        missing.sort();
        orphaned.sort();
        Err(ApiError::internal("Tool wiring is incomplete")
            .with_hint("Every tool in tool_catalog.json needs exactly one operation, and path placeholders must be required arguments")
            .with_details(serde_json::json!({
                "missing_handlers": missing,
                "missing_catalog_entries": orphaned,
                "undeclared_path_params": undeclared,
            })))
    }

    pub fn initialize(settings: Settings) -> Result<Self, ApiError> {
        let logger = Logger::new("cobransaas");
        let http = reqwest::Client::builder()
            .user_agent(network::USER_AGENT)
            .build()
            .map_err(|err| ApiError::internal(format!("Failed to build HTTP client: {}", err)))?;

        let tokens = Arc::new(TokenManager::new(&settings, http.clone(), logger.clone()));
        let limiter = Arc::new(RateLimiter::per_second(settings.rate_limit_per_second));
        let executor = Arc::new(RequestExecutor::new(
            &settings,
            http,
            tokens.clone(),
            limiter,
            logger.clone(),
        ));

        let catalog = tool_catalog()?;
        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        for def in managers::all_operations() {
            let handler = Arc::new(ResourceOperation::new(def, executor.clone()));
            if handlers.insert(def.name.to_string(), handler).is_some() {
                return Err(ApiError::internal(format!(
                    "Operation declared twice: {}",
                    def.name
                )));
            }
        }
        Self::validate_tool_wiring(catalog, &handlers)?;

        let registry = ToolRegistry::new(logger.clone(), catalog, handlers);
        logger.debug("Application wired", Some(&serde_json::json!({ "settings": format!("{:?}", settings) })));
        Ok(Self {
            logger,
            settings,
            tokens,
            executor,
            registry,
        })
    }
}
