use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use sqlx::PgPool;

use crate::auth::jwt::{self, Claims};
use crate::db;
use crate::error::AppError;
use crate::models::{Role, User};
use crate::state::SharedState;

pub const ACCESS_COOKIE: &str = "access_token";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: Role,
}

impl AuthUser {
    /// The role claim is only a hint; the stored account decides. A token minted
    /// before a suspension or demotion is refused.
    pub async fn require_admin(&self, pool: &PgPool) -> Result<User, AppError> {
        if self.role != Role::Admin {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        let user = db::users::find_by_id(pool, self.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

        if !user.is_active() {
            return Err(AppError::Forbidden("Account is suspended".to_string()));
        }
        if user.role != Role::Admin {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        Ok(user)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        AuthUser {
            user_id: claims.sub,
            role: claims.role,
        }
    }
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        // Bearer header takes precedence over the cookie
        if let Some(auth_header) = parts.headers.get("authorization") {
            let auth_str = auth_header
                .to_str()
                .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;

            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let claims = jwt::decode_token(token, &state.config.jwt_secret)
                    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
                return Ok(claims.into());
            }
        }

        let jar = CookieJar::from_headers(&parts.headers);
        if let Some(cookie) = jar.get(ACCESS_COOKIE) {
            let claims = jwt::decode_token(cookie.value(), &state.config.jwt_secret)
                .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
            return Ok(claims.into());
        }

        Err(AppError::Unauthorized(
            "Missing authentication token".to_string(),
        ))
    }
}
