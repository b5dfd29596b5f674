mod cache;
mod clock;
mod config;
mod error;
mod model;
mod recommend;
mod resolver;
mod scoring;
mod seed;
mod server;
mod service;
mod transition;
mod tuning;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cache::CareerCache;
use career_common::catalog_api::CatalogApiClient;
use career_common::redis::RedisCache;
use career_common::storage::{BlobStore, FileBlobStore, MemoryBlobStore, RedisBlobStore};
use clock::SystemClock;
use config::{Config, StorageBackend};
use resolver::{CatalogService, HttpCatalogService, SnapshotStore, SourceResolver};
use scoring::RelevanceScorer;
use seed::Dataset;
use server::CareerServer;
use service::CareerService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr (stdout is reserved for MCP JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting career-engine MCP server");

    // 1. Load config and tuning
    let config = Config::from_env()?;
    info!(
        remote = config.catalog_api.as_ref().map_or("disabled", |api| api.base_url.as_str()),
        storage = ?config.storage,
        ttl_secs = config.cache.ttl.as_secs(),
        max_entries = config.cache.max_entries,
        pool_limit = config.pool_limit,
        preload = config.preload,
        "configuration loaded"
    );
    let tuning = config.load_tuning()?;
    if let Some(path) = &config.tuning_path {
        info!(path = %path.display(), "tuning overrides loaded");
    }

    // 2. Durable storage (Redis degrades gracefully if unreachable)
    let store: Arc<dyn BlobStore> = match &config.storage {
        StorageBackend::File(dir) => {
            let store = FileBlobStore::new(dir.clone());
            info!(data_dir = %store.root().display(), "file storage selected");
            Arc::new(store)
        }
        StorageBackend::Redis(url) => {
            let redis = RedisCache::new(Some(url.as_str()));
            if redis.is_available().await {
                info!("redis connected");
            } else {
                warn!("redis unavailable, cache and snapshot will not persist");
            }
            Arc::new(RedisBlobStore::new(redis))
        }
        StorageBackend::Memory => {
            info!("in-memory storage selected, nothing will persist");
            Arc::new(MemoryBlobStore::new())
        }
    };

    // 3. Source chain: remote catalog, durable snapshot, bundled catalog
    let remote: Option<Arc<dyn CatalogService>> = match config.catalog_api.clone() {
        Some(api) => Some(Arc::new(HttpCatalogService::new(CatalogApiClient::new(api)?))),
        None => None,
    };
    let bundled = Dataset::bundled_catalog();
    let seed = Dataset::transition_seed();
    for dataset in [&bundled, &seed] {
        info!(
            dataset = dataset.name(),
            version = dataset.version(),
            records = dataset.records().len(),
            "embedded dataset loaded"
        );
    }

    let scorer = Arc::new(RelevanceScorer::new(tuning.scoring.clone()));
    let resolver = Arc::new(SourceResolver::new(
        remote,
        SnapshotStore::new(Arc::clone(&store)),
        bundled,
        Arc::clone(&scorer),
    ));

    // 4. Cache (rehydrates from storage) and service
    let cache = Arc::new(CareerCache::open(store, config.cache, Arc::new(SystemClock)).await);
    let stats = cache.stats();
    info!(
        entries = stats.size,
        max_entries = cache.settings().max_entries,
        "cache opened"
    );
    let service = Arc::new(CareerService::new(
        cache,
        resolver,
        scorer,
        &tuning,
        seed,
        config.pool_limit,
    ));

    if config.preload {
        let warm = Arc::clone(&service);
        tokio::spawn(async move { warm.warm_up().await });
    }

    // 5. Serve MCP on stdio
    let server = CareerServer::new(Arc::clone(&service));
    info!("MCP server ready, serving on stdio");
    let running = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;

    running.waiting().await?;
    service.flush().await;
    info!("MCP server shut down");
    Ok(())
}
