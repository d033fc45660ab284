use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vnstock_agent::{api::start_server, config::AppConfig, orchestrator::Orchestrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    info!("VnStock Agent - API Server");
    info!(
        port = config.port,
        model = %config.model.model_name,
        "Configuration loaded"
    );

    // Shared components are built once and reused by every request
    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);

    start_server(orchestrator, config.port).await?;

    Ok(())
}
