mod config;
mod entities;
mod error;
mod routes;
mod services;

#[cfg(test)]
mod test_helpers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use routes::create_routes;
use services::files::FileService;
use services::s3::S3Service;

#[derive(Parser, Debug)]
#[command(version, about = "File upload and download-link service")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Do not apply pending database migrations at startup
    #[arg(long)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the subscriber so RUST_LOG from it applies
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let db = Database::connect(config.database_url.as_str())
        .await
        .context("Failed to connect to database")?;

    if cli.skip_migrations {
        tracing::info!("Skipping database migrations");
    } else {
        Migrator::up(&db, None)
            .await
            .context("Failed to run database migrations")?;
    }

    let store = Arc::new(S3Service::new(&config));
    let service = FileService::new(db, store, config.storage_settings());
    tracing::info!(
        bucket = %config.s3_bucket,
        region = %config.s3_region,
        presign_expires_seconds = config.presign_expires_seconds,
        "Storage configured"
    );

    let app = create_routes(service);

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
