pub mod logger;
pub mod operation;
pub mod rate_limiter;
pub mod request_executor;
pub mod token_manager;
pub mod tool_registry;
