use tracing::info;
use tracing_subscriber::EnvFilter;
use vnstock_agent::{config::AppConfig, orchestrator::Orchestrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        eprintln!("Usage: orchestrator <câu hỏi>");
        std::process::exit(2);
    }

    let config = AppConfig::from_env()?;
    let orchestrator = Orchestrator::from_config(&config)?;

    info!(%query, "Running orchestrator");

    match orchestrator.process_query(&query).await {
        Ok(result) => {
            info!(path = %result.path, "Orchestration successful");
            if !result.sub_queries.is_empty() {
                eprintln!("Sub-queries:");
                for (i, sub_query) in result.sub_queries.iter().enumerate() {
                    eprintln!("  {}: {}", i + 1, sub_query);
                }
            }
            println!("{}", result.output);
            Ok(())
        }
        Err(e) => {
            eprintln!("Orchestration failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
