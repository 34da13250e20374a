use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::handler::Handler;
use axum::middleware::{from_extractor_with_state, from_fn_with_state};
use axum::routing::{get, post};
use std::sync::Arc;

use crate::config::Config;
use crate::db::GmaoStorage;
use crate::handlers::{assets, chat, dependencies, documents, health, transcribe, work_orders};
use crate::middleware::auth::RequireKeyAuth;
use crate::middleware::rate_limit::{AiRateLimiter, ai_rate_limiter, limit_ai_requests};
use crate::service::blobs::BlobStore;
use crate::service::cache::DocumentHashCache;
use crate::service::dependency::{DependencySuggester, SuggestionCache};
use crate::service::extraction::ExtractionPipeline;
use crate::service::llm::SharedModel;
use crate::service::rag::{AnswerCache, Assistant};

/// Room for multipart boundaries and the non-file fields around an upload.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// In-memory caches, grouped so a periodic sweep can reach all of them.
#[derive(Clone)]
pub struct GmaoCaches {
    pub answers: Arc<AnswerCache>,
    pub suggestions: Arc<SuggestionCache>,
    pub metadata: Arc<DocumentHashCache>,
}

impl GmaoCaches {
    pub fn new(cfg: &Config) -> Self {
        Self {
            answers: Arc::new(AnswerCache::new(cfg.cache.answer_ttl())),
            suggestions: Arc::new(SuggestionCache::new(cfg.cache.suggestion_ttl())),
            metadata: Arc::new(DocumentHashCache::new(cfg.cache.metadata_ttl())),
        }
    }

    /// Drop expired entries everywhere; returns how many went.
    pub fn purge_expired(&self) -> usize {
        self.answers.purge_expired()
            + self.suggestions.purge_expired()
            + self.metadata.memory().purge_expired()
    }
}

#[derive(Clone)]
pub struct GmaoState {
    pub cfg: Arc<Config>,
    pub storage: GmaoStorage,
    pub blobs: BlobStore,
    pub model: SharedModel,
    pub caches: GmaoCaches,
    pub pipeline: ExtractionPipeline,
    pub assistant: Assistant,
    pub dependencies: DependencySuggester,
    pub limiter: Arc<AiRateLimiter>,
    gmao_key: Arc<str>,
}

impl GmaoState {
    pub fn new(cfg: Config, storage: GmaoStorage, model: SharedModel) -> Self {
        let caches = GmaoCaches::new(&cfg);
        let blobs = BlobStore::new(cfg.storage.upload_dir.clone());
        let pipeline = ExtractionPipeline::new(
            storage.clone(),
            blobs.clone(),
            model.clone(),
            caches.metadata.clone(),
        );
        let assistant = Assistant::new(
            storage.clone(),
            model.clone(),
            caches.answers.clone(),
            cfg.limits.chat_history_messages,
            cfg.limits.retrieval_top_k,
        );
        let dependencies = DependencySuggester::new(
            storage.clone(),
            model.clone(),
            caches.suggestions.clone(),
            cfg.limits.max_dependency_text_chars,
        );
        let limiter = Arc::new(ai_rate_limiter(cfg.limits.ai_requests_per_minute));
        let gmao_key: Arc<str> = Arc::from(cfg.basic.gmao_key.as_str());
        Self {
            cfg: Arc::new(cfg),
            storage,
            blobs,
            model,
            caches,
            pipeline,
            assistant,
            dependencies,
            limiter,
            gmao_key,
        }
    }

    pub fn gmao_key(&self) -> &str {
        &self.gmao_key
    }
}

pub fn gmao_router(state: GmaoState) -> Router {
    let limits = &state.cfg.limits;
    let ai_quota = from_fn_with_state(state.clone(), limit_ai_requests);
    let upload_limit = DefaultBodyLimit::max(limits.max_upload_bytes + MULTIPART_OVERHEAD);
    let audio_limit = DefaultBodyLimit::max(limits.max_audio_bytes + MULTIPART_OVERHEAD);

    let api = Router::new()
        .route(
            "/documents",
            get(documents::list_documents).post(
                documents::upload_document
                    .layer(ai_quota.clone())
                    .layer(upload_limit),
            ),
        )
        .route("/documents/{id}", get(documents::get_document))
        .route(
            "/documents/{id}/reprocess",
            post(documents::reprocess_document).layer(ai_quota.clone()),
        )
        .route(
            "/transcribe",
            post(transcribe::transcribe_audio)
                .layer::<_, std::convert::Infallible>(ai_quota.clone())
                .layer(audio_limit),
        )
        .route("/chat", post(chat::chat).layer(ai_quota.clone()))
        .route("/conversations/{id}", get(chat::get_conversation))
        .route(
            "/dependencies/suggest",
            post(dependencies::suggest_dependencies).layer(ai_quota),
        )
        .route("/dependencies", get(dependencies::list_suggestions))
        .route(
            "/dependencies/{id}/accept",
            post(dependencies::accept_suggestion),
        )
        .route(
            "/dependencies/{id}/reject",
            post(dependencies::reject_suggestion),
        )
        .route(
            "/assets",
            get(assets::list_assets).post(assets::create_asset),
        )
        .route(
            "/assets/{id}",
            get(assets::get_asset)
                .patch(assets::update_asset)
                .delete(assets::delete_asset),
        )
        .route("/assets/{id}/aliases", post(assets::add_alias))
        .route("/assets/{id}/qr", get(assets::asset_qr))
        .route("/qr/{code}", get(assets::asset_by_qr))
        .route(
            "/work-orders",
            get(work_orders::list_work_orders).post(work_orders::create_work_order),
        )
        .route(
            "/work-orders/{id}",
            get(work_orders::get_work_order).patch(work_orders::update_work_order),
        )
        .route_layer(from_extractor_with_state::<RequireKeyAuth, _>(
            state.clone(),
        ));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(limits.max_json_bytes))
        .with_state(state)
}
