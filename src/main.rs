#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(warnings)]

use tabletop_platform_service::infrastructure::{config::AppConfig, http::start_server};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::load()?;
    info!(
        mode = %config.mode,
        addr = %config.server.socket_addr(),
        auth_configured = config.auth.is_configured(),
        backend_configured = config.backend.is_configured(),
        "tabletop platform service starting"
    );

    start_server(config).await
}

/// Structured logging with a service-scoped default filter. `RUST_LOG`
/// overrides it when set.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabletop_platform_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
