//! Password-reset token ledger.
//!
//! A token moves from `Live` to exactly one terminal state: `Consumed` by a
//! successful redemption, `Expired` once the wall clock reaches its expiry, or
//! `Superseded` when a newer token is issued for the same account. Issuance and
//! redemption each run in a single transaction; redemption flips the `used`
//! flag with a conditional update so concurrent attempts cannot both succeed.

pub mod clock;
pub mod code;
pub mod notify;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::auth::password;
use crate::db;
use crate::models::password_reset_token::is_expired;
use crate::models::user::normalize_email;

pub use clock::{Clock, SystemClock};
pub use code::{CodeGenerator, TokenGenerator};
pub use notify::{LogNotifier, ResetNotifier};

/// Consumed and expired rows older than this are purged after each issuance.
const STALE_RETENTION_HOURS: i64 = 24;

#[derive(Debug)]
pub enum ResetError {
    /// Unknown email, wrong code, or a code that was already consumed or superseded.
    InvalidToken,
    TokenExpired,
    Hashing(String),
    Persistence(sqlx::Error),
}

impl std::fmt::Display for ResetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetError::InvalidToken => write!(f, "invalid reset token"),
            ResetError::TokenExpired => write!(f, "reset token expired"),
            ResetError::Hashing(msg) => write!(f, "password hashing failed: {msg}"),
            ResetError::Persistence(err) => write!(f, "persistence failure: {err}"),
        }
    }
}

impl std::error::Error for ResetError {}

impl From<sqlx::Error> for ResetError {
    fn from(err: sqlx::Error) -> Self {
        ResetError::Persistence(err)
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub user_id: i64,
    pub email: String,
    pub full_name: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Lifetime measured on the ledger's clock at issuance.
    pub valid_for: Duration,
}

#[derive(Debug, Clone)]
pub enum IssueOutcome {
    Issued(IssuedToken),
    /// Never surfaced to the requester differently from `Issued`.
    AccountNotFound,
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordReset {
    pub user_id: i64,
}

pub struct ResetLedger {
    clock: Arc<dyn Clock>,
    generator: Arc<dyn TokenGenerator>,
    ttl: Duration,
}

impl ResetLedger {
    pub fn new(clock: Arc<dyn Clock>, generator: Arc<dyn TokenGenerator>, ttl: Duration) -> Self {
        Self {
            clock,
            generator,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Issue a fresh code for the account behind `email`, superseding any outstanding one.
    pub async fn issue(&self, pool: &PgPool, email: &str) -> Result<IssueOutcome, ResetError> {
        let email = normalize_email(email);
        let now = self.clock.now();

        let mut tx = pool.begin().await?;

        let Some(user) = db::users::find_by_email_for_update(&mut *tx, &email).await? else {
            tracing::debug!("Password reset requested for unregistered email");
            return Ok(IssueOutcome::AccountNotFound);
        };

        let superseded = db::password_reset_tokens::supersede_all_for_user(&mut *tx, user.id).await?;

        let token = self.generator.generate();
        let expires_at = now + self.ttl;
        db::password_reset_tokens::create(
            &mut *tx,
            user.id,
            &user.email,
            &code::hash_code(&token),
            expires_at,
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = user.id,
            superseded,
            "Password reset token issued"
        );

        self.purge_stale(pool, now).await;

        Ok(IssueOutcome::Issued(IssuedToken {
            user_id: user.id,
            email: user.email,
            full_name: user.full_name,
            token,
            expires_at,
            valid_for: self.ttl,
        }))
    }

    /// Consume `token` and set the account's password to `new_password`.
    ///
    /// The token flip and the password update commit together. If either write
    /// fails the transaction rolls back and the token stays redeemable.
    pub async fn redeem(
        &self,
        pool: &PgPool,
        email: &str,
        token: &str,
        new_password: &str,
    ) -> Result<PasswordReset, ResetError> {
        let email = normalize_email(email);
        let token_hash = code::hash_code(token);
        let password_hash = password::hash(new_password).map_err(ResetError::Hashing)?;
        let now = self.clock.now();

        let mut tx = pool.begin().await?;

        let stored = db::password_reset_tokens::find_unused(&mut *tx, &email, &token_hash)
            .await?
            .ok_or(ResetError::InvalidToken)?;

        if is_expired(stored.expires_at, now) {
            db::password_reset_tokens::mark_expired(&mut *tx, stored.id).await?;
            tx.commit().await?;
            tracing::info!(user_id = stored.user_id, "Expired password reset token presented");
            return Err(ResetError::TokenExpired);
        }

        if !db::password_reset_tokens::mark_used(&mut *tx, stored.id).await? {
            return Err(ResetError::InvalidToken);
        }

        if !db::users::update_password(&mut *tx, stored.user_id, &password_hash).await? {
            return Err(ResetError::InvalidToken);
        }

        tx.commit().await?;

        tracing::info!(user_id = stored.user_id, "Password reset via token");

        Ok(PasswordReset {
            user_id: stored.user_id,
        })
    }

    async fn purge_stale(&self, pool: &PgPool, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(STALE_RETENTION_HOURS);
        match db::password_reset_tokens::purge_stale(pool, now, cutoff).await {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Purged {n} stale password reset tokens"),
            Err(e) => tracing::warn!("Failed to purge stale password reset tokens: {e}"),
        }
    }
}
