use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::PasswordResetToken;

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: i64,
    email: &str,
    token_hash: &str,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
) -> Result<PasswordResetToken, sqlx::Error> {
    sqlx::query_as::<_, PasswordResetToken>(
        "INSERT INTO password_reset_tokens (user_id, email, token_hash, expires_at, created_at)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(user_id)
    .bind(email)
    .bind(token_hash)
    .bind(expires_at)
    .bind(created_at)
    .fetch_one(executor)
    .await
}

/// Retire every unconsumed token of the user. Returns how many were superseded.
pub async fn supersede_all_for_user<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE password_reset_tokens SET used = true, superseded = true
         WHERE user_id = $1 AND used = false",
    )
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Unconsumed token matching the account's current email and the code. Expiry is left to the caller.
pub async fn find_unused<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    email: &str,
    token_hash: &str,
) -> Result<Option<PasswordResetToken>, sqlx::Error> {
    sqlx::query_as::<_, PasswordResetToken>(
        "SELECT t.* FROM password_reset_tokens t
         JOIN users u ON u.id = t.user_id
         WHERE u.email = $1 AND t.token_hash = $2 AND t.used = false",
    )
    .bind(email)
    .bind(token_hash)
    .fetch_optional(executor)
    .await
}

/// Retire a token that was presented after its expiry. Same compare-and-set as `mark_used`.
pub async fn mark_expired<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE password_reset_tokens SET used = true, expired = true WHERE id = $1 AND used = false",
    )
    .bind(id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Compare-and-set on the `used` flag. Returns false if another caller got there first.
pub async fn mark_used<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE password_reset_tokens SET used = true WHERE id = $1 AND used = false")
            .bind(id)
            .execute(executor)
            .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<PasswordResetToken>, sqlx::Error> {
    sqlx::query_as::<_, PasswordResetToken>(
        "SELECT * FROM password_reset_tokens WHERE user_id = $1 ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Delete consumed or expired rows created before `cutoff`.
pub async fn purge_stale(
    pool: &PgPool,
    now: DateTime<Utc>,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM password_reset_tokens
         WHERE (used = true OR expires_at <= $1) AND created_at < $2",
    )
    .bind(now)
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
