//! HTTP surface: form-encoded requests in, JSON out, session in a cookie.

mod handlers;
mod session;

use crate::account::AccountService;
use crate::chat::ChatProxy;
use crate::store::SessionStore;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub accounts: AccountService,
    pub chat: ChatProxy,
    pub sessions: Arc<dyn SessionStore>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/account/register/", post(handlers::register))
        .route("/account/verify_email/", post(handlers::verify_email))
        .route("/account/verify_email/resend/", post(handlers::resend_code))
        .route("/account/login/", post(handlers::login))
        .route("/account/logout/", post(handlers::logout))
        .route("/llm/", get(handlers::llm_page))
        .route("/llm/generate/", post(handlers::llm_generate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
