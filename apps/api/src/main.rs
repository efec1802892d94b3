use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use shared_config::AppConfig;

mod router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env());
    if !config.is_configured() {
        tracing::warn!("Supabase configuration incomplete, storage calls will fail");
    }

    let app = router::create_router(config);

    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Hospital admin API listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
