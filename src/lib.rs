pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod reset;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::email::SystemMailer;
use crate::rate_limit::AttemptLimiter;
use crate::reset::{Clock, CodeGenerator, LogNotifier, ResetLedger, ResetNotifier, SystemClock};
use crate::state::{AppState, SharedState};

pub fn build_app(pool: PgPool, config: Config) -> Router {
    build_app_with(pool, config, Arc::new(SystemClock)).0
}

/// Build the router around an explicit clock. Returns the shared state as well
/// so callers can reach the ledger and limiters directly.
pub fn build_app_with(pool: PgPool, config: Config, clock: Arc<dyn Clock>) -> (Router, SharedState) {
    let notifier: Arc<dyn ResetNotifier> = match config.smtp.as_ref() {
        Some(smtp) => match SystemMailer::new(smtp) {
            Ok(mailer) => {
                tracing::info!("System SMTP configured");
                Arc::new(mailer)
            }
            Err(e) => {
                tracing::warn!("System SMTP not available: {e}");
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    };

    let ledger = ResetLedger::new(
        clock,
        Arc::new(CodeGenerator::default()),
        chrono::Duration::minutes(config.reset.token_ttl_minutes),
    );

    let cors = cors_layer(&config.cors_origins);
    let max_body_size = config.max_body_size;

    let state: SharedState = Arc::new(AppState {
        pool,
        config,
        ledger,
        notifier,
        login_limiter: AttemptLimiter::for_login(),
        reset_limiter: AttemptLimiter::for_reset(),
    });

    let app = Router::new()
        .merge(routes::api_routes())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state.clone());

    (app, state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin '{o}': {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
