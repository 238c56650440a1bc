use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::Authenticator;
use crate::handlers::{pages, public};
use crate::middleware::{authenticate, require_page_access};
use crate::provider::SharedProvider;

/// State shared by every handler and middleware
#[derive(Clone)]
pub struct AppState {
    pub provider: SharedProvider,
    /// `None` when authentication is disabled
    pub auth: Option<Arc<Authenticator>>,
}

impl AppState {
    pub fn new(provider: SharedProvider, auth: Option<Arc<Authenticator>>) -> Self {
        Self { provider, auth }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Protected API
        .merge(page_routes(state.clone()))
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn page_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/pages", get(pages::pages_get).post(pages::pages_post))
        .route("/api/pages/:name", get(pages::page_get).delete(pages::page_delete))
        .route("/api/pages/:name/versions", get(pages::versions_get))
        .route("/api/pages/:name/versions/:version", post(pages::version_restore))
        // Last added runs first: authenticate, then the page permission check
        .route_layer(from_fn_with_state(state.clone(), require_page_access))
        .route_layer(from_fn_with_state(state, authenticate))
}
