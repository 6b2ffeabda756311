use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::map_db_error;
use crate::error::AppResult;
use crate::models::Apartment;

#[derive(Debug, sqlx::FromRow)]
struct ApartmentRow {
    id: Uuid,
    name: String,
    address: String,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<ApartmentRow> for Apartment {
    fn from(row: ApartmentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            address: row.address,
            owner_id: row.owner_id,
            created_at: row.created_at,
        }
    }
}

const APARTMENT_COLUMNS: &str = "id, name, address, owner_id, created_at";

pub async fn insert(
    pool: &PgPool,
    name: &str,
    address: &str,
    owner_id: Uuid,
) -> AppResult<Apartment> {
    let row = sqlx::query_as::<_, ApartmentRow>(&format!(
        "INSERT INTO apartments (name, address, owner_id, created_by)
         VALUES ($1, $2, $3, $3)
         RETURNING {APARTMENT_COLUMNS}"
    ))
    .bind(name)
    .bind(address)
    .bind(owner_id)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)?;

    Ok(row.into())
}

pub async fn find_by_id(pool: &PgPool, apartment_id: Uuid) -> AppResult<Option<Apartment>> {
    let row = sqlx::query_as::<_, ApartmentRow>(&format!(
        "SELECT {APARTMENT_COLUMNS} FROM apartments WHERE id = $1"
    ))
    .bind(apartment_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    Ok(row.map(Into::into))
}

pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid) -> AppResult<Vec<Apartment>> {
    let rows = sqlx::query_as::<_, ApartmentRow>(&format!(
        "SELECT {APARTMENT_COLUMNS} FROM apartments
         WHERE owner_id = $1
         ORDER BY created_at DESC"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)?;

    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn update(
    pool: &PgPool,
    apartment_id: Uuid,
    name: Option<&str>,
    address: Option<&str>,
) -> AppResult<Option<Apartment>> {
    let row = sqlx::query_as::<_, ApartmentRow>(&format!(
        "UPDATE apartments
         SET name = COALESCE($2, name), address = COALESCE($3, address)
         WHERE id = $1
         RETURNING {APARTMENT_COLUMNS}"
    ))
    .bind(apartment_id)
    .bind(name)
    .bind(address)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    Ok(row.map(Into::into))
}

/// Deletion of an apartment with lease history is blocked by a store-level
/// trigger; `map_db_error` turns that into a business error.
pub async fn delete(pool: &PgPool, apartment_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM apartments WHERE id = $1")
        .bind(apartment_id)
        .execute(pool)
        .await
        .map_err(map_db_error)?;

    Ok(result.rows_affected() > 0)
}
