//! MCP Auth Gateway - stateless multi-tenant introspection gateway

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use mcp_auth_gateway::{
    cli::{Cli, Command},
    config::Config,
    gateway::Gateway,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::Check) => run_check(&cli),
        Some(Command::Serve) | None => run_server(cli).await,
    }
}

/// Load the configuration and report whether it is usable.
fn run_check(cli: &Cli) -> ExitCode {
    match load_config(cli) {
        Ok(config) => {
            println!(
                "Configuration OK: {} active of {} client registration(s), default endpoint {}",
                config.active_clients().count(),
                config.clients.len(),
                config.introspection.default_endpoint
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Configuration error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the gateway server.
async fn run_server(cli: Cli) -> ExitCode {
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let gateway = match Gateway::new(config) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("Failed to initialize gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("Starting gateway");
    match gateway.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Gateway error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Load configuration and apply CLI overrides.
fn load_config(cli: &Cli) -> mcp_auth_gateway::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = &cli.host {
        config.server.host.clone_from(host);
    }

    Ok(config)
}
