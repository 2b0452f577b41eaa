use std::sync::Arc;

use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cosmos_wire::config::Config;
use cosmos_wire::db::SqliteGateway;
use cosmos_wire::routes::{self, AppState};
use cosmos_wire::store::Gateway;

const CONFIG_PATH: &str = "cosmos-wire.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cosmos_wire=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load_with_env(CONFIG_PATH)?;
    info!("Configuration loaded");

    // Storage is optional; pages degrade when it is missing
    let gateway: Arc<dyn Gateway> = Arc::new(SqliteGateway::new(config.database_url.as_deref()));

    let state = Arc::new(AppState::from_config(&config, gateway)?);

    let app = routes::router(state)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
