use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use redis::aio::ConnectionManager;

use crate::config::{Config, StoreBackend};
use store::{MemoryStore, MongoStore, Store};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    /// Only used for auth rate limiting
    pub redis: Option<ConnectionManager>,
    /// Present when `selection_seed` is configured
    pub selection_rng: Option<Arc<Mutex<StdRng>>>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match config.store_backend {
            StoreBackend::Mongo => {
                let client = mongodb::Client::with_uri_str(&config.mongo_uri)
                    .await
                    .context("Failed to create MongoDB client")?;
                let mongo = MongoStore::new(client, &config.mongo_database);
                mongo.ensure_indexes().await?;
                tracing::info!("MongoDB connected (database: {})", config.mongo_database);
                Arc::new(mongo)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let redis = match &config.redis_uri {
            Some(uri) => Some(connect_redis(uri).await?),
            None => {
                tracing::info!("Redis not configured, auth rate limiting disabled");
                None
            }
        };

        Ok(Self::assemble(config, store, redis))
    }

    /// State over an existing store without Redis.
    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Self {
        Self::assemble(config, store, None)
    }

    fn assemble(config: Config, store: Arc<dyn Store>, redis: Option<ConnectionManager>) -> Self {
        let selection_rng = config
            .selection_seed
            .map(|seed| Arc::new(Mutex::new(StdRng::seed_from_u64(seed))));

        Self {
            config,
            store,
            redis,
            selection_rng,
        }
    }
}

async fn connect_redis(uri: &str) -> anyhow::Result<ConnectionManager> {
    tracing::info!("Attempting to connect to Redis...");

    let client = redis::Client::open(uri).context("Failed to create Redis client")?;
    let redis = tokio::time::timeout(Duration::from_secs(30), ConnectionManager::new(client))
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

    let mut conn = redis.clone();
    tokio::time::timeout(
        Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

    tracing::info!("Redis connection established successfully");
    Ok(redis)
}

pub mod activity_service;
pub mod analytics_service;
pub mod answer_service;
pub mod auth_service;
pub mod capability;
pub mod classroom_service;
pub mod content_service;
pub mod hint_service;
pub mod intervention_service;
pub mod management_service;
pub mod question_selector;
pub mod store;
pub mod trackers;
