use std::sync::LazyLock;

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::auth::extractor::ACCESS_COOKIE;
use crate::auth::jwt::{self, Claims, encode_token};
use crate::auth::password;
use crate::config::ResetDelivery;
use crate::db;
use crate::error::{AppError, conflict_on_unique};
use crate::middleware::audit;
use crate::models::user::normalize_email;
use crate::models::{Role, User};
use crate::reset::{IssueOutcome, ResetError};
use crate::state::SharedState;

const RESET_REQUESTED_MESSAGE: &str = "If the email exists, a reset code has been sent";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub location: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    #[serde(alias = "resetToken")]
    pub token: String,
    pub new_password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub user: User,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequestResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

fn access_cookie(access_token: &str) -> CookieJar {
    let access = Cookie::build((ACCESS_COOKIE, access_token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(jwt::ACCESS_TOKEN_TTL_MINUTES))
        .build();

    CookieJar::new().add(access)
}

fn clear_access_cookie() -> CookieJar {
    let access = Cookie::build((ACCESS_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();
    CookieJar::new().add(access)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = normalize_email(&req.email);
    let full_name = req.full_name.trim();

    if full_name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Full name, email and password are required".to_string(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    password::check_strength(&req.password).map_err(AppError::BadRequest)?;

    let role: Role = req
        .role
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid role".to_string()))?;

    let pw_hash = password::hash(&req.password).map_err(AppError::Internal)?;

    let mut tx = state.pool.begin().await?;

    // Only the very first account may claim Admin; the advisory lock serializes that check
    if role == Role::Admin {
        sqlx::query("SELECT pg_advisory_xact_lock(1)")
            .execute(&mut *tx)
            .await?;

        if db::users::count_all(&mut *tx).await? > 0 {
            return Err(AppError::Forbidden(
                "Admin accounts cannot be self-registered".to_string(),
            ));
        }
    }

    let blood_type = req
        .blood_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let user = db::users::create(
        &mut *tx,
        &db::users::NewUser {
            full_name,
            email: &email,
            phone: req.phone.trim(),
            blood_type,
            location: req.location.trim(),
            password_hash: &pw_hash,
            role,
        },
    )
    .await
    .map_err(|e| conflict_on_unique(e, "Email already exists"))?;

    tx.commit().await?;

    tracing::info!(user_id = user.id, role = %user.role, "User registered");

    audit::log_event(
        &state.pool,
        Some(user.id),
        "user.registered",
        "user",
        Some(user.id),
        None,
    )
    .await;

    Ok(Json(AuthResponse {
        success: true,
        message: "Registration successful".to_string(),
        access_token: None,
        user,
    }))
}

pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let email = normalize_email(&req.email);

    if state.login_limiter.check(&email).is_err() {
        return Err(AppError::RateLimited(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    let user = db::users::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    let valid = password::verify(&req.password, &user.password_hash).map_err(AppError::Internal)?;

    if !valid {
        state.login_limiter.record_failure(&email);
        return Err(AppError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    if !user.is_active() {
        return Err(AppError::Forbidden("Account is suspended".to_string()));
    }

    state.login_limiter.clear(&email);

    let claims = Claims::new(user.id, user.role);
    let access_token =
        encode_token(&claims, &state.config.jwt_secret).map_err(AppError::Internal)?;

    audit::log_event(&state.pool, Some(user.id), "user.login", "user", Some(user.id), None).await;

    let jar = access_cookie(&access_token);
    Ok((
        jar,
        Json(AuthResponse {
            success: true,
            message: "Login successful".to_string(),
            access_token: Some(access_token),
            user,
        }),
    ))
}

pub async fn logout() -> (CookieJar, Json<MessageResponse>) {
    (clear_access_cookie(), MessageResponse::ok("Logged out successfully"))
}

pub async fn forgot_password(
    State(state): State<SharedState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<ResetRequestResponse>, AppError> {
    if req.email.trim().is_empty() {
        return Err(AppError::BadRequest("Email is required".to_string()));
    }

    // Same acknowledgment whether or not the email is registered
    let mut response = ResetRequestResponse {
        success: true,
        message: RESET_REQUESTED_MESSAGE.to_string(),
        token: None,
        expires_at: None,
    };

    let IssueOutcome::Issued(issued) = state.ledger.issue(&state.pool, &req.email).await? else {
        return Ok(Json(response));
    };

    // Not awaited: only registered emails reach this write
    let pool = state.pool.clone();
    let user_id = issued.user_id;
    tokio::spawn(async move {
        audit::log_event(
            &pool,
            Some(user_id),
            "password_reset.requested",
            "user",
            Some(user_id),
            None,
        )
        .await;
    });

    match state.config.reset.delivery {
        ResetDelivery::Response => {
            response.token = Some(issued.token);
            response.expires_at = Some(issued.expires_at);
        }
        ResetDelivery::Email => {
            let notifier = state.notifier.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier
                    .send_reset_code(
                        &issued.email,
                        &issued.full_name,
                        &issued.token,
                        issued.valid_for,
                    )
                    .await
                {
                    tracing::error!(
                        notifier = notifier.name(),
                        "Failed to deliver password reset code: {e}"
                    );
                }
            });
        }
    }

    Ok(Json(response))
}

pub async fn reset_password(
    State(state): State<SharedState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = normalize_email(&req.email);

    if email.is_empty() || req.token.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Email and reset token are required".to_string(),
        ));
    }
    password::check_strength(&req.new_password).map_err(AppError::BadRequest)?;

    if state.reset_limiter.check(&email).is_err() {
        return Err(AppError::RateLimited(
            "Too many reset attempts. Please request a new code later.".to_string(),
        ));
    }

    let reset = match state
        .ledger
        .redeem(&state.pool, &email, &req.token, &req.new_password)
        .await
    {
        Ok(reset) => reset,
        Err(err @ ResetError::InvalidToken) => {
            state.reset_limiter.record_failure(&email);
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    state.reset_limiter.clear(&email);
    state.login_limiter.clear(&email);

    audit::log_event(
        &state.pool,
        Some(reset.user_id),
        "password_reset.completed",
        "user",
        Some(reset.user_id),
        None,
    )
    .await;

    Ok(MessageResponse::ok("Password reset successful"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_check() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("user example.com"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn reset_request_accepts_legacy_field_name() {
        let req: ResetPasswordRequest = serde_json::from_str(
            r#"{"email":"a@b.co","resetToken":"ABC123","newPassword":"NewPass123"}"#,
        )
        .unwrap();
        assert_eq!(req.token, "ABC123");
        assert_eq!(req.new_password, "NewPass123");
    }

    #[test]
    fn reset_ack_omits_token_when_absent() {
        let body = serde_json::to_value(ResetRequestResponse {
            success: true,
            message: RESET_REQUESTED_MESSAGE.to_string(),
            token: None,
            expires_at: None,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "success": true, "message": RESET_REQUESTED_MESSAGE })
        );
    }
}
