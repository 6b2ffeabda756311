use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::map_db_error;
use crate::error::AppResult;
use crate::models::{Role, User};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    full_name: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AppResult<User> {
        Ok(User {
            id: self.id,
            full_name: self.full_name,
            email: self.email,
            role: Role::parse(&self.role)?,
            created_at: self.created_at,
        })
    }
}

const USER_COLUMNS: &str = "id, full_name, email, role, created_at";

pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> AppResult<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    row.map(UserRow::into_user).transpose()
}

/// Only full_name is mutable after signup; email and role are fixed by the
/// identity provider.
pub async fn update_full_name(
    pool: &PgPool,
    user_id: Uuid,
    full_name: &str,
) -> AppResult<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET full_name = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(full_name)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    row.map(UserRow::into_user).transpose()
}
