use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use object_gateway::{
    config::Config,
    db::{self, PgImageStore},
    routes::create_router,
    storage::create_object_store,
    utils::{init_logger, shutdown_signal},
    AppState,
};

#[derive(Debug, Parser)]
#[command(name = "object-gateway", version, about = "HTTP gateway for S3-compatible object storage")]
struct Cli {
    /// Address to bind, overrides HOST
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overrides PORT
    #[arg(long)]
    port: Option<u16>,

    /// Do not run database migrations on startup
    #[arg(long, env = "SKIP_MIGRATIONS")]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first, so flags backed by env vars see its values
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logger();

    // Load configuration, missing storage or database settings fail here
    let mut config = Config::from_env()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    info!(
        server = ?config.server,
        storage = ?config.storage.provider,
        max_upload_bytes = config.upload.max_upload_bytes,
        "Configuration loaded"
    );

    // Connect to database
    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to connect to database")?;

    if cli.skip_migrations {
        info!("Skipping database migrations");
    } else {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        info!("Database migrations completed");
    }

    let objects = create_object_store(&config.storage)?;
    let images = Arc::new(PgImageStore::new(pool.clone()));

    let bind_to = (config.server.host.clone(), config.server.port);

    // Create shared state
    let state = AppState::new(config, objects, images);
    let app = create_router(state);

    // Start server
    let listener = TcpListener::bind((bind_to.0.as_str(), bind_to.1))
        .await
        .with_context(|| format!("Failed to bind {}:{}", bind_to.0, bind_to.1))?;
    let addr: SocketAddr = listener.local_addr()?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped, closing database pool");
    pool.close().await;

    Ok(())
}
