use boxkeeper_inventory::{BoxKeeper, KvStore, LocalArtifacts, MemoryStore, RedisStore, SessionAuthority};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, StoreKind};

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;

pub struct AppState {
    pub keeper: BoxKeeper,
    // Present when running against redis; probed by /readyz
    pub redis: Option<RedisStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,boxkeeper=debug,tower_http=info")),
        )
        .init();

    let config = Config::parse();

    let (kv, redis): (Arc<dyn KvStore>, Option<RedisStore>) = match config.store {
        StoreKind::Redis => {
            info!("Connecting to redis...");
            let store = RedisStore::connect(&config.redis_url, config.redis_timeout()).await?;
            (Arc::new(store.clone()) as Arc<dyn KvStore>, Some(store))
        }
        StoreKind::Memory => {
            tracing::warn!("Using the in-memory store; all data is lost on restart");
            (Arc::new(MemoryStore::new()) as Arc<dyn KvStore>, None)
        }
    };

    tokio::fs::create_dir_all(&config.artifact_dir).await?;
    let artifacts = Arc::new(LocalArtifacts::new(&config.artifact_dir, &config.public_base_url));
    let sessions = SessionAuthority::new(config.jwt_secret.as_bytes())?;

    let shared_state = Arc::new(AppState {
        keeper: BoxKeeper::new(kv, artifacts, sessions),
        redis,
    });

    let app = routes::build_router(shared_state, &config.artifact_dir, config.max_upload_bytes());

    info!("BoxKeeper gateway listening on {}", config.listen);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
