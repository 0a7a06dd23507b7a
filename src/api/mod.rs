//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::{middleware as axum_middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::audit::AuditNotifier;
use crate::ledger::{AccountGuard, AccountLocks, LedgerEngine};
use crate::store::LedgerStore;

pub use routes::create_router;

/// Shared state handed to every route
pub struct AppState<S: LedgerStore> {
    pub engine: Arc<LedgerEngine<S>>,
    pub guard: Arc<AccountGuard<S>>,
}

impl<S: LedgerStore> AppState<S> {
    /// Build the engine and account guard over one store and one lock table
    pub fn new(store: Arc<S>, audit: AuditNotifier) -> Self {
        let locks = Arc::new(AccountLocks::new());
        Self {
            engine: Arc::new(LedgerEngine::with_locks(
                Arc::clone(&store),
                Arc::clone(&locks),
                audit.clone(),
            )),
            guard: Arc::new(AccountGuard::new(store, locks, audit)),
        }
    }
}

impl<S: LedgerStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            guard: Arc::clone(&self.guard),
        }
    }
}

/// Build the application router
pub fn app<S: LedgerStore>(state: AppState<S>) -> Router {
    // Axum layers run last-added first: logging -> actor -> handler
    let protected_routes = create_router::<S>()
        .layer(axum_middleware::from_fn(middleware::actor_middleware))
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    Router::new()
        // Health check (no auth)
        .route("/health", get(health_check))
        .nest("/api", protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
