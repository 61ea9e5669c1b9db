use serde_json::Value;
use tracing_subscriber::EnvFilter;

const LOG_FORMAT_ENV: &str = "COBRANSAAS_LOG_FORMAT";

/// Installs the global `tracing` subscriber. Output goes to stderr because stdout
/// carries the protocol stream.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    // A subscriber may already be installed (tests, embedding).
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

/// Context-scoped facade over `tracing` events.
#[derive(Debug, Clone)]
pub struct Logger {
    context: String,
}

impl Logger {
    pub fn new(context: &str) -> Self {
        Self {
            context: context.to_string(),
        }
    }

    pub fn child(&self, suffix: &str) -> Self {
        let context = if suffix.is_empty() {
            self.context.clone()
        } else {
            format!("{}:{}", self.context, suffix)
        };
        Self { context }
    }

    fn log(&self, level: LogLevel, message: &str, meta: Option<&Value>) {
        let meta = meta.filter(|m| !m.is_null()).map(|m| m.to_string());
        let meta = meta.as_deref();
        let context = self.context.as_str();
        match level {
            LogLevel::Error => tracing::error!(context, meta, "{}", message),
            LogLevel::Warn => tracing::warn!(context, meta, "{}", message),
            LogLevel::Info => tracing::info!(context, meta, "{}", message),
            LogLevel::Debug => tracing::debug!(context, meta, "{}", message),
        }
    }

    pub fn error(&self, message: &str, meta: Option<&Value>) {
        self.log(LogLevel::Error, message, meta);
    }

    pub fn warn(&self, message: &str, meta: Option<&Value>) {
        self.log(LogLevel::Warn, message, meta);
    }

    pub fn info(&self, message: &str, meta: Option<&Value>) {
        self.log(LogLevel::Info, message, meta);
    }

    pub fn debug(&self, message: &str, meta: Option<&Value>) {
        self.log(LogLevel::Debug, message, meta);
    }
}
