use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Instrument};

use quill_server::{create_app, AppConfig, QuillServer};

/// Quill HTTP Server
#[derive(Parser, Debug)]
#[command(name = "quill-server")]
#[command(about = "Posts API with OIDC login and Permify authorization")]
struct Args {
    /// Server bind address (overrides http.host)
    #[arg(long, env = "QUILL_HOST")]
    host: Option<String>,

    /// Server port (overrides http.port)
    #[arg(short, long, env = "QUILL_PORT")]
    port: Option<u16>,

    /// Configuration file path (yaml, toml or json)
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.http.host = host;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }
    if args.verbose {
        config.log.level = "debug".to_string();
    }

    let logger = logger_redacted::init(&config.log)?;
    let root = logger.span().clone();
    let addr = format!("{}:{}", config.http.host, config.http.port);

    info!(parent: &root, version = env!("CARGO_PKG_VERSION"), "Starting Quill server");

    let server = QuillServer::new(config).instrument(root.clone()).await?;
    let app = root.in_scope(|| create_app(server));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!(parent: &root, address = %addr, "Quill server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!(parent: &root, "Quill server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
