//! Last Mile Analyzer - Axum Server
//!
//! Reads its configuration from the TOML file named by `LAST_MILE_CONFIG`
//! when set.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use last_mile_analyzer::api::{create_router, AppState};
use last_mile_analyzer::config::AnalyzerConfig;
use last_mile_analyzer::console;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("last_mile_analyzer=info".parse()?))
        .init();

    let config_path = std::env::var_os("LAST_MILE_CONFIG").map(PathBuf::from);
    let config = AnalyzerConfig::load(config_path.as_deref())?;
    let state = Arc::new(AppState::from_config(&config)?);

    console::print_banner();
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], 7860));
    println!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
