pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::state::AppState;
use crate::store::StudyStore;

/// App backed by Postgres when `DATABASE_URL` is usable, otherwise by no
/// store at all (store-backed routes answer 503).
pub async fn create_app() -> axum::Router {
    let config = Config::from_env();
    let store: Option<Arc<dyn StudyStore>> = match db::DatabaseProxy::from_env().await {
        Ok(proxy) => Some(proxy as Arc<dyn StudyStore>),
        Err(err) => {
            tracing::warn!(error = %err, "database not initialized, running without a store");
            None
        }
    };

    create_app_with_store(store, &config)
}

pub fn create_app_with_store(store: Option<Arc<dyn StudyStore>>, config: &Config) -> axum::Router {
    let state = AppState::new(store, config);

    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
