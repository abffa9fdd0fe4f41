//! sims-import library - bulk user import for the school information system
//!
//! Creates teacher, student and parent accounts in batches of up to 50,
//! reporting one outcome per submitted row.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, UpstreamError};

use crate::services::{
    AuthorizationPort, BatchImporter, IdentityProvider, RelationalStore, RoleTableAuthorizer,
};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Decides who may import
    pub authorizer: Arc<dyn AuthorizationPort>,
    /// Row loop over the identity provider and relational store
    pub importer: Arc<BatchImporter>,
}

impl AppState {
    /// Wire the authorizer and importer to the same upstream pair
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn RelationalStore>) -> Self {
        let authorizer = RoleTableAuthorizer::new(identity.clone(), store.clone());
        let importer = BatchImporter::new(identity, store);
        Self::from_parts(Arc::new(authorizer), importer)
    }

    pub fn from_parts(authorizer: Arc<dyn AuthorizationPort>, importer: BatchImporter) -> Self {
        Self {
            authorizer,
            importer: Arc::new(importer),
        }
    }
}

/// Build application router
///
/// Health and templates are public; the import endpoints check the caller
/// themselves so guard order stays under their control.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::post;

    let import = Router::new()
        .route("/bulk-import-users", post(api::import_users))
        .route("/bulk-import-users/csv", post(api::import_users_csv));

    Router::new()
        .merge(import)
        .merge(api::template_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(api::cors::cors_layer())
        .layer(api::cors::allow_headers_layer())
        .layer(api::cors::allow_origin_layer())
}
