use anyhow::Result;
use tracing::info;
use userapi_core::{config::Config, server, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let prometheus_handle = telemetry::init(&config.telemetry)?;

    info!("Starting User API");
    info!("HTTP server listening on {}", config.http_addr());

    server::run(config, prometheus_handle).await
}
