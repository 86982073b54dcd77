use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::extractor::AuthUser;
use crate::auth::password;
use crate::db;
use crate::error::{AppError, conflict_on_unique};
use crate::middleware::audit;
use crate::models::user::normalize_email;
use crate::models::{ActivityLogEntry, Role, User, UserStatus};
use crate::routes::auth::{MessageResponse, is_valid_email};
use crate::state::SharedState;

const DEFAULT_ACTIVITY_LIMIT: i64 = 50;
const MAX_ACTIVITY_LIMIT: i64 = 200;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct UpdateUserStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: i64,
    pub active_donors: i64,
    pub users_by_role: BTreeMap<String, i64>,
    pub blood_requests: i64,
    pub system_health: String,
}

impl DashboardStats {
    fn unknown() -> Self {
        Self {
            total_users: 0,
            active_donors: 0,
            users_by_role: BTreeMap::new(),
            blood_requests: 0,
            system_health: "Unknown".to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            full_name: user.full_name,
            email: user.email,
            phone: user.phone,
            location: user.location,
        }
    }
}

pub async fn list_users(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<User>>, AppError> {
    auth.require_admin(&state.pool).await?;
    let users = db::users::list_all(&state.pool).await?;
    Ok(Json(users))
}

pub async fn get_user(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, AppError> {
    auth.require_admin(&state.pool).await?;

    let user = db::users::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

pub async fn update_user(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    auth.require_admin(&state.pool).await?;

    let full_name = req.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::BadRequest("Full name is required".to_string()));
    }
    let role: Role = req
        .role
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid role value".to_string()))?;

    let user = db::users::update_details(&state.pool, id, full_name, req.phone.trim(), role)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    audit::log_event(
        &state.pool,
        Some(auth.user_id),
        "user.updated",
        "user",
        Some(user.id),
        Some(json!({ "role": user.role })),
    )
    .await;

    Ok(MessageResponse::ok("User updated successfully"))
}

pub async fn update_user_status(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserStatusRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    auth.require_admin(&state.pool).await?;

    let status: UserStatus = req
        .status
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid status value".to_string()))?;

    if id == auth.user_id && status == UserStatus::Suspended {
        return Err(AppError::BadRequest(
            "You cannot suspend your own account".to_string(),
        ));
    }

    let user = db::users::update_status(&state.pool, id, status)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    audit::log_event(
        &state.pool,
        Some(auth.user_id),
        "user.status_changed",
        "user",
        Some(user.id),
        Some(json!({ "status": user.status })),
    )
    .await;

    Ok(MessageResponse::ok("User status updated successfully"))
}

pub async fn dashboard_stats(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<DashboardStats>, AppError> {
    auth.require_admin(&state.pool).await?;

    match collect_stats(&state).await {
        Ok(stats) => Ok(Json(stats)),
        Err(e) => {
            tracing::error!("Error retrieving dashboard stats: {e}");
            Ok(Json(DashboardStats::unknown()))
        }
    }
}

async fn collect_stats(state: &SharedState) -> Result<DashboardStats, sqlx::Error> {
    let total_users = db::users::count_all(&state.pool).await?;
    let active_donors =
        db::users::count_by_role_and_status(&state.pool, Role::Donor, UserStatus::Active).await?;

    let mut users_by_role: BTreeMap<String, i64> =
        Role::ALL.iter().map(|r| (r.to_string(), 0)).collect();
    for (role, count) in db::users::count_per_role(&state.pool).await? {
        users_by_role.insert(role.to_string(), count);
    }

    Ok(DashboardStats {
        total_users,
        active_donors,
        users_by_role,
        // No blood-request table exists yet
        blood_requests: 0,
        system_health: "Healthy".to_string(),
    })
}

pub async fn activity_logs(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityLogEntry>>, AppError> {
    auth.require_admin(&state.pool).await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    let entries = db::audit::list_recent(&state.pool, limit).await?;
    Ok(Json(entries))
}

pub async fn get_profile(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = auth.require_admin(&state.pool).await?;
    Ok(Json(user.into()))
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let current = auth.require_admin(&state.pool).await?;

    let full_name = req.full_name.trim();
    let email = normalize_email(&req.email);
    if full_name.is_empty() {
        return Err(AppError::BadRequest("Full name is required".to_string()));
    }
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }

    let mut tx = state.pool.begin().await?;

    db::users::update_profile(
        &mut *tx,
        auth.user_id,
        full_name,
        &email,
        req.phone.trim(),
        req.location.trim(),
    )
    .await
    .map_err(|e| conflict_on_unique(e, "Email already exists"))?
    .ok_or_else(|| AppError::NotFound("Admin profile not found".to_string()))?;

    // Codes sent to the previous address must not outlive the change
    if email != current.email {
        let superseded =
            db::password_reset_tokens::supersede_all_for_user(&mut *tx, auth.user_id).await?;
        tracing::info!(user_id = auth.user_id, superseded, "Account email changed");
    }

    tx.commit().await?;

    audit::log_event(
        &state.pool,
        Some(auth.user_id),
        "profile.updated",
        "user",
        Some(auth.user_id),
        None,
    )
    .await;

    Ok(MessageResponse::ok("Profile updated successfully"))
}

pub async fn update_password(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = auth.require_admin(&state.pool).await?;
    password::check_strength(&req.new_password).map_err(AppError::BadRequest)?;

    let valid =
        password::verify(&req.current_password, &user.password_hash).map_err(AppError::Internal)?;
    if !valid {
        return Err(AppError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    let pw_hash = password::hash(&req.new_password).map_err(AppError::Internal)?;
    db::users::update_password(&state.pool, user.id, &pw_hash).await?;

    audit::log_event(
        &state.pool,
        Some(user.id),
        "user.password_changed",
        "user",
        Some(user.id),
        None,
    )
    .await;

    Ok(MessageResponse::ok("Password updated successfully"))
}
