use sqlx::PgPool;

use crate::models::{Role, User, UserStatus};

pub struct NewUser<'a> {
    pub full_name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub blood_type: Option<&'a str>,
    pub location: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
}

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user: &NewUser<'_>,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (full_name, email, phone, blood_type, location, password_hash, role)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(user.full_name)
    .bind(user.email)
    .bind(user.phone)
    .bind(user.blood_type)
    .bind(user.location)
    .bind(user.password_hash)
    .bind(user.role)
    .fetch_one(executor)
    .await
}

pub async fn find_by_email<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(executor)
        .await
}

/// Same as `find_by_email` but row-locks the account for the rest of the transaction.
pub async fn find_by_email_for_update<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1 FOR UPDATE")
        .bind(email)
        .fetch_optional(executor)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn count_all<'e, E: sqlx::PgExecutor<'e>>(executor: E) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(executor)
        .await?;
    Ok(row.0)
}

pub async fn count_by_role_and_status(
    pool: &PgPool,
    role: Role,
    status: UserStatus,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = $1 AND status = $2")
        .bind(role)
        .bind(status)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn count_per_role(pool: &PgPool) -> Result<Vec<(Role, i64)>, sqlx::Error> {
    sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")
        .fetch_all(pool)
        .await
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id DESC")
        .fetch_all(pool)
        .await
}

/// Returns false when no account has the given id.
pub async fn update_password<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: i64,
    password_hash: &str,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(executor)
            .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn update_details(
    pool: &PgPool,
    id: i64,
    full_name: &str,
    phone: &str,
    role: Role,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET full_name = $2, phone = $3, role = $4, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(full_name)
    .bind(phone)
    .bind(role)
    .fetch_optional(pool)
    .await
}

pub async fn update_status(
    pool: &PgPool,
    id: i64,
    status: UserStatus,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_optional(pool)
    .await
}

pub async fn update_profile<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: i64,
    full_name: &str,
    email: &str,
    phone: &str,
    location: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET full_name = $2, email = $3, phone = $4, location = $5, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(full_name)
    .bind(email)
    .bind(phone)
    .bind(location)
    .fetch_optional(executor)
    .await
}
