use std::sync::Arc;

use anyhow::Context;
use costume_contest::{
    app,
    auth::Clients,
    blob::LocalBlobStore,
    clock::{Clock, FixedClock, SystemClock},
    config::Config,
    media::PassthroughCodec,
    store::{DocumentStore, MemoryStore, SqliteStore},
    AppState, Collaborators,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;

    let store: Arc<dyn DocumentStore> = if config.database_url == "memory" {
        warn!("DATABASE_URL=memory, nothing will outlive this process");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::connect(&config.database_url).await.context("opening the database")?)
    };

    let clock: Arc<dyn Clock> = match config.clock_override {
        Some(at) => {
            warn!("clock pinned to {at}");
            Arc::new(FixedClock::new(at))
        }
        None => Arc::new(SystemClock),
    };

    let secrets = tokio::fs::read_to_string(&config.client_secrets)
        .await
        .with_context(|| format!("reading {}", config.client_secrets.display()))?;
    let clients = Clients::from_json(serde_json::from_str(&secrets)?, &config.public_url).map_err(|e| e.0)?;

    let media = LocalBlobStore::new(&config.media_dir, "/media");
    let state = AppState::new(
        Collaborators {
            store,
            blobs: Arc::new(media.clone()),
            codec: Arc::new(PassthroughCodec),
            clock,
            media: Some(media),
        },
        config.schedule,
        config.limits,
        clients,
    );

    let router = app(state, time::Duration::minutes(config.session_idle_minutes));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    info!("listening on {} ({})", config.bind_addr, config.public_url);
    axum::serve(listener, router).await?;
    Ok(())
}
