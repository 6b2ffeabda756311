use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::map_db_error;
use crate::error::AppResult;
use crate::models::{Lease, LeaseStatus};

#[derive(Debug, sqlx::FromRow)]
struct LeaseRow {
    id: Uuid,
    apartment_id: Uuid,
    tenant_id: Uuid,
    status: String,
    start_date: NaiveDate,
    archived_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl LeaseRow {
    fn into_lease(self) -> AppResult<Lease> {
        Ok(Lease {
            id: self.id,
            apartment_id: self.apartment_id,
            tenant_id: self.tenant_id,
            status: LeaseStatus::parse(&self.status)?,
            start_date: self.start_date,
            archived_at: self.archived_at,
            created_at: self.created_at,
        })
    }
}

/// Lease joined with tenant identity, for owner-facing views.
#[derive(Debug, Clone)]
pub struct LeaseWithTenant {
    pub lease: Lease,
    pub tenant_full_name: String,
    pub tenant_email: String,
}

#[derive(Debug, sqlx::FromRow)]
struct LeaseWithTenantRow {
    id: Uuid,
    apartment_id: Uuid,
    tenant_id: Uuid,
    status: String,
    start_date: NaiveDate,
    archived_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    tenant_full_name: String,
    tenant_email: String,
}

impl LeaseWithTenantRow {
    fn into_lease_with_tenant(self) -> AppResult<LeaseWithTenant> {
        Ok(LeaseWithTenant {
            lease: Lease {
                id: self.id,
                apartment_id: self.apartment_id,
                tenant_id: self.tenant_id,
                status: LeaseStatus::parse(&self.status)?,
                start_date: self.start_date,
                archived_at: self.archived_at,
                created_at: self.created_at,
            },
            tenant_full_name: self.tenant_full_name,
            tenant_email: self.tenant_email,
        })
    }
}

const LEASE_COLUMNS: &str =
    "id, apartment_id, tenant_id, status, start_date, archived_at, created_at";

const LEASE_WITH_TENANT_SELECT: &str = "SELECT l.id, l.apartment_id, l.tenant_id, l.status,
            l.start_date, l.archived_at, l.created_at,
            u.full_name AS tenant_full_name, u.email AS tenant_email
     FROM leases l
     JOIN users u ON u.id = l.tenant_id";

/// The "current active lease" is a query-time derived value (at most one
/// row matches the partial unique index), never a cached pointer.
pub async fn find_active_by_apartment(
    pool: &PgPool,
    apartment_id: Uuid,
) -> AppResult<Option<Lease>> {
    let row = sqlx::query_as::<_, LeaseRow>(&format!(
        "SELECT {LEASE_COLUMNS} FROM leases WHERE apartment_id = $1 AND status = 'active'"
    ))
    .bind(apartment_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    row.map(LeaseRow::into_lease).transpose()
}

pub async fn find_active_by_tenant(pool: &PgPool, tenant_id: Uuid) -> AppResult<Option<Lease>> {
    let row = sqlx::query_as::<_, LeaseRow>(&format!(
        "SELECT {LEASE_COLUMNS} FROM leases WHERE tenant_id = $1 AND status = 'active'"
    ))
    .bind(tenant_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    row.map(LeaseRow::into_lease).transpose()
}

pub async fn find_by_id(pool: &PgPool, lease_id: Uuid) -> AppResult<Option<Lease>> {
    let row = sqlx::query_as::<_, LeaseRow>(&format!(
        "SELECT {LEASE_COLUMNS} FROM leases WHERE id = $1"
    ))
    .bind(lease_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    row.map(LeaseRow::into_lease).transpose()
}

pub async fn find_active_with_tenant(
    pool: &PgPool,
    apartment_id: Uuid,
) -> AppResult<Option<LeaseWithTenant>> {
    let row = sqlx::query_as::<_, LeaseWithTenantRow>(&format!(
        "{LEASE_WITH_TENANT_SELECT} WHERE l.apartment_id = $1 AND l.status = 'active'"
    ))
    .bind(apartment_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    row.map(LeaseWithTenantRow::into_lease_with_tenant)
        .transpose()
}

/// Most recent lease for an apartment, optionally including archived ones.
/// Used by the owner apartment list when `include_archived` is set.
pub async fn find_latest_with_tenant(
    pool: &PgPool,
    apartment_id: Uuid,
    include_archived: bool,
) -> AppResult<Option<LeaseWithTenant>> {
    let status_clause = if include_archived {
        "l.status IN ('active', 'archived')"
    } else {
        "l.status = 'active'"
    };
    let row = sqlx::query_as::<_, LeaseWithTenantRow>(&format!(
        "{LEASE_WITH_TENANT_SELECT}
         WHERE l.apartment_id = $1 AND {status_clause}
         ORDER BY (l.status = 'active') DESC, l.start_date DESC
         LIMIT 1"
    ))
    .bind(apartment_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    row.map(LeaseWithTenantRow::into_lease_with_tenant)
        .transpose()
}

pub async fn list_by_apartment(
    pool: &PgPool,
    apartment_id: Uuid,
) -> AppResult<Vec<LeaseWithTenant>> {
    let rows = sqlx::query_as::<_, LeaseWithTenantRow>(&format!(
        "{LEASE_WITH_TENANT_SELECT}
         WHERE l.apartment_id = $1
         ORDER BY l.start_date DESC, l.created_at DESC"
    ))
    .bind(apartment_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)?;

    rows.into_iter()
        .map(LeaseWithTenantRow::into_lease_with_tenant)
        .collect()
}

/// Inserts the lease created by invitation acceptance. The partial unique
/// indexes reject a second active lease per apartment or per tenant;
/// `map_db_error` reports those as `APARTMENT_HAS_LEASE` / `USER_HAS_LEASE`.
pub async fn insert_active_tx(
    conn: &mut PgConnection,
    apartment_id: Uuid,
    tenant_id: Uuid,
    start_date: NaiveDate,
) -> AppResult<Lease> {
    let row = sqlx::query_as::<_, LeaseRow>(&format!(
        "INSERT INTO leases (apartment_id, tenant_id, status, start_date, created_by)
         VALUES ($1, $2, 'active', $3, $2)
         RETURNING {LEASE_COLUMNS}"
    ))
    .bind(apartment_id)
    .bind(tenant_id)
    .bind(start_date)
    .fetch_one(conn)
    .await
    .map_err(map_db_error)?;

    row.into_lease()
}

/// `active -> archived`; returns None when the lease was not active (the
/// transition out of a terminal state does not exist).
pub async fn archive(pool: &PgPool, lease_id: Uuid) -> AppResult<Option<Lease>> {
    let row = sqlx::query_as::<_, LeaseRow>(&format!(
        "UPDATE leases
         SET status = 'archived', archived_at = now()
         WHERE id = $1 AND status = 'active'
         RETURNING {LEASE_COLUMNS}"
    ))
    .bind(lease_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    row.map(LeaseRow::into_lease).transpose()
}
