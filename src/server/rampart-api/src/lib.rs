//! # Rampart API
//!
//! REST layer for Rampart.
//!
//! ## Endpoints
//!
//! - `/v1/keys` - List and import keys
//! - `/v1/keys/:id` - Public key (JSON or PEM), replace, delete
//! - `/v1/keys/:id/public.pem` - Public key as PEM
//! - `/v1/keys/:id/actions/...` - Sign and decrypt
//! - `/v1/system/status` - Liveness
//!
//! Resources are declared as [`policy::Policy`] implementations and executed by
//! the [`engine`], which owns method checks, content negotiation and status codes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod engine;
pub mod envelope;
pub mod media;
pub mod policy;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use rampart_keystore::KeyStore;

pub use engine::{AppState, EngineConfig, API_PREFIX};
pub use envelope::Envelope;

/// Creates the API router over `store`.
pub fn create_router(store: Arc<dyn KeyStore>, config: EngineConfig) -> Router {
    let verbose = config.verbose;
    let router = Router::new()
        .fallback(engine::dispatch)
        .with_state(AppState::new(store, config))
        .layer(CatchPanicLayer::new());

    if verbose {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}
