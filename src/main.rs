//! Toolsmith - Main entry point.

use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use toolsmith::{
    cli::{Cli, Command, demo::TextStatsTool},
    config::{ProcessEnv, ServerConfig},
    docs,
    server,
    tools::{ToolHandler, ToolRuntime},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads TOOLSMITH_* variables
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let handler: Arc<dyn ToolHandler> = Arc::new(TextStatsTool);

    if let Some(Command::Schema { example }) = &cli.command {
        let document = if *example {
            docs::example_request(&handler.schema())
        } else {
            docs::openapi_document(&handler.metadata(), &handler.schema())
        };
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    init_tracing(cli.log_json);

    let mut config = ServerConfig::resolve(&ProcessEnv)?;
    cli.apply(&mut config)?;

    tracing::info!("Starting Toolsmith...");
    if !config.auth_enabled() {
        tracing::warn!("No API keys configured, authentication is disabled");
    }
    if config.development {
        tracing::warn!("Development mode: internal error details are exposed");
    }

    let runtime = ToolRuntime::new(handler, config.runtime_settings())
        .inspect_err(|e| tracing::error!(code = e.code(), "Tool runtime could not be built: {}", e))?;
    runtime
        .start(json!({}))
        .await
        .inspect_err(|e| tracing::error!(code = e.code(), "Tool failed to start: {}", e))?;

    let result = server::serve(runtime.clone(), &config, shutdown_signal()).await;

    if let Err(e) = runtime.stop().await {
        tracing::warn!("Tool did not stop cleanly: {}", e);
    }
    result?;

    tracing::info!("Toolsmith shut down");
    Ok(())
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("toolsmith=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
