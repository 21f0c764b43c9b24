//! HTTP router and the state shared by its handlers.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::{self, TraceLayer};
use tracing::{warn, Level};

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::db::Database;
use crate::edit::{CanonicalEncoding, EditEngine, EditOrchestrator};
use crate::storage::ObjectStore;
use crate::upload::Uploader;

pub mod error;
mod images;

pub fn router(app_state: AppState, max_upload_bytes: usize) -> Router {
    images::router(app_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub store: Arc<dyn ObjectStore>,
    pub cache: Arc<ResponseCache>,
    pub orchestrator: Arc<EditOrchestrator>,
    pub uploader: Arc<Uploader>,
}

impl AppState {
    pub fn new(config: &Config, db: Arc<Database>, store: Arc<dyn ObjectStore>) -> Self {
        let cache = Arc::new(ResponseCache::new(&config.cache));
        let engine = EditEngine::new(CanonicalEncoding::from_config(&config.edit));
        let orchestrator = EditOrchestrator::new(
            db.clone(),
            store.clone(),
            cache.clone(),
            engine,
            config.cache.invalidation,
            config.edit.staging_dir.clone(),
        );
        let uploader = Uploader::new(
            db.clone(),
            store.clone(),
            cache.clone(),
            config.display.image_url.clone(),
        );

        Self {
            db,
            store,
            cache,
            orchestrator: Arc::new(orchestrator),
            uploader: Arc::new(uploader),
        }
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}")
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
