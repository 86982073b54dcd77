use sqlx::PgPool;

use crate::models::ActivityLogEntry;

pub async fn log_event(
    pool: &PgPool,
    user_id: Option<i64>,
    action: &str,
    resource_type: &str,
    resource_id: Option<i64>,
    details: Option<serde_json::Value>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_events (user_id, action, resource_type, resource_id, details)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(action)
    .bind(resource_type)
    .bind(resource_id)
    .bind(details)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<ActivityLogEntry>, sqlx::Error> {
    sqlx::query_as::<_, ActivityLogEntry>(
        "SELECT e.id, e.user_id, u.full_name AS user_name, u.role AS user_role,
                e.action, e.resource_type, e.resource_id, e.details, e.created_at
         FROM audit_events e
         LEFT JOIN users u ON u.id = e.user_id
         ORDER BY e.created_at DESC, e.id DESC
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
