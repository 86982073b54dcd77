use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Role;

/// Audit event joined with the acting user, as shown on the activity page.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub user_role: Option<Role>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<i64>,
    pub details: Option<serde_json::Value>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}
