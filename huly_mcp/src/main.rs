use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use huly_mcp::{
    Config, HulyClient, WorkspaceGateway, build_dispatcher,
    config::DEFAULT_CONFIG_PATH,
    logging,
};
use mcp_server::{RouterService, Server, transport};

#[derive(Debug, Parser)]
#[command(name = "huly-mcp", version, about = "Model Context Protocol server for Huly.io")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(Some(&args.config))
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    let _guard = logging::init(&config.mcp.logging)?;

    // Stdin reads run on a blocking thread that never returns on its own, so
    // the runtime is shut down with a deadline instead of dropped.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the tokio runtime")?;
    let outcome = runtime.block_on(run(config));
    runtime.shutdown_timeout(Duration::from_secs(1));

    if let Err(e) = &outcome {
        tracing::error!(error = ?e, "huly-mcp exited with an error");
    }
    outcome
}

async fn run(config: Config) -> Result<()> {
    let gateway: Arc<dyn WorkspaceGateway> = Arc::new(HulyClient::new(config.huly.clone()));
    let outcome = serve(&config, gateway.clone()).await;
    gateway.disconnect().await;
    outcome
}

async fn serve(config: &Config, gateway: Arc<dyn WorkspaceGateway>) -> Result<()> {
    gateway.connect().await.context("failed to connect to Huly")?;
    let dispatcher = build_dispatcher(config, gateway).context("failed to register capabilities")?;

    tracing::info!(
        name = %config.mcp.server.name,
        version = %config.mcp.server.version,
        "serving MCP on stdio"
    );
    let server = Server::new(RouterService(dispatcher));
    tokio::select! {
        result = server.run(transport::stdio()) => result.context("server loop failed")?,
        signal = shutdown_signal() => {
            let signal = signal.context("failed to listen for shutdown signals")?;
            tracing::info!(signal, "shutting down");
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}
