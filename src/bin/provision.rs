//! Creates the saved-pictures and saved-articles tables.
//!
//! Reads the same configuration as the server. Use a URL with `?mode=rwc`
//! (for example `sqlite:cosmos_wire.db?mode=rwc`) to create the file.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cosmos_wire::config::Config;
use cosmos_wire::db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cosmos_wire=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load_with_env("cosmos-wire.toml")?;
    let url = config
        .database_url
        .context("no database configured; set DATABASE_URL or database_url in cosmos-wire.toml")?;

    let db = Database::new(&url)
        .await
        .with_context(|| format!("could not connect to {}", url))?;
    db.initialize().await.context("schema creation failed")?;

    info!("Tables ready at {}", url);
    Ok(())
}
