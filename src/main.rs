use clap::Parser;
use cobransaas_mcp::services::logger::init_tracing;
use cobransaas_mcp::settings::Settings;
use std::path::PathBuf;

/// MCP server exposing the CobranSaaS collection API as tools over stdio.
#[derive(Debug, Parser)]
#[command(name = "cobransaas-mcp", version)]
struct Cli {
    /// Settings file (toml, json or yaml); environment variables still take precedence.
    #[arg(long, env = "COBRANSAAS_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("cobransaas-mcp: {}", err);
            std::process::exit(1);
        }
    };
    if let Err(err) = cobransaas_mcp::mcp::server::run_stdio(settings).await {
        eprintln!("cobransaas-mcp: {}", err);
        std::process::exit(1);
    }
}
