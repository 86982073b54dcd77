pub mod admin;
pub mod auth;
pub mod health;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/health", get(health::health))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        // Admin: user management
        .route("/api/admin/users", get(admin::list_users))
        .route(
            "/api/admin/users/{id}",
            get(admin::get_user).put(admin::update_user),
        )
        .route("/api/admin/users/{id}/status", put(admin::update_user_status))
        // Admin: dashboard
        .route("/api/admin/dashboard/stats", get(admin::dashboard_stats))
        .route("/api/admin/activity-logs", get(admin::activity_logs))
        // Admin: own profile
        .route(
            "/api/admin/profile",
            get(admin::get_profile).put(admin::update_profile),
        )
        .route("/api/admin/profile/password", put(admin::update_password))
}
