use mimalloc::MiMalloc;
use opengmao::config::Config;
use opengmao::db::GmaoStorage;
use opengmao::router::{GmaoState, gmao_router};
use opengmao::service::llm::GeminiModel;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        upload_dir = %cfg.storage.upload_dir.display(),
        proxy = %cfg.llm.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        chat_model = %cfg.llm.chat_model,
        extraction_model = %cfg.llm.extraction_model,
        loglevel = %cfg.basic.loglevel,
    );
    if cfg.llm.api_key.is_empty() {
        warn!("llm.api_key is empty; every model call will be rejected upstream");
    }

    let storage = GmaoStorage::connect(&cfg.basic.database_url).await?;
    let interrupted = storage.fail_interrupted_documents().await?;
    if interrupted > 0 {
        warn!(count = interrupted, "documents interrupted mid-extraction marked failed");
    }

    let model = GeminiModel::new(cfg.llm.clone())?;
    let addr = cfg.basic.listen_addr.clone();
    let state = GmaoState::new(cfg, storage, Arc::new(model));
    state.blobs.ensure_dir().await?;

    let caches = state.caches.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(CACHE_SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            let purged = caches.purge_expired();
            if purged > 0 {
                debug!(purged, "expired cache entries dropped");
            }
        }
    });

    let app = gmao_router(state);
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
