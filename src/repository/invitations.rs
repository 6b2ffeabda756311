use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::map_db_error;
use crate::error::AppResult;
use crate::models::{InvitationLink, InvitationStatus};

#[derive(Debug, sqlx::FromRow)]
struct InvitationRow {
    id: Uuid,
    apartment_id: Uuid,
    token: String,
    status: String,
    created_by: Uuid,
    accepted_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl InvitationRow {
    fn into_invitation(self) -> AppResult<InvitationLink> {
        Ok(InvitationLink {
            id: self.id,
            apartment_id: self.apartment_id,
            token: self.token,
            status: InvitationStatus::parse(&self.status)?,
            created_by: self.created_by,
            accepted_by: self.accepted_by,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct InvitationWithAcceptor {
    pub invitation: InvitationLink,
    pub accepted_by_name: Option<String>,
}

const INVITATION_COLUMNS: &str =
    "id, apartment_id, token, status, created_by, accepted_by, created_at";

/// Supersession: every pending link for the apartment becomes expired.
/// Last-writer-wins by design; no token can be un-expired.
pub async fn expire_pending_tx(conn: &mut PgConnection, apartment_id: Uuid) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE invitation_links SET status = 'expired'
         WHERE apartment_id = $1 AND status = 'pending'",
    )
    .bind(apartment_id)
    .execute(conn)
    .await
    .map_err(map_db_error)?;

    Ok(result.rows_affected())
}

pub async fn insert_pending_tx(
    conn: &mut PgConnection,
    apartment_id: Uuid,
    token: &str,
    created_by: Uuid,
) -> AppResult<InvitationLink> {
    let row = sqlx::query_as::<_, InvitationRow>(&format!(
        "INSERT INTO invitation_links (apartment_id, token, status, created_by)
         VALUES ($1, $2, 'pending', $3)
         RETURNING {INVITATION_COLUMNS}"
    ))
    .bind(apartment_id)
    .bind(token)
    .bind(created_by)
    .fetch_one(conn)
    .await
    .map_err(map_db_error)?;

    row.into_invitation()
}

pub async fn find_by_token(pool: &PgPool, token: &str) -> AppResult<Option<InvitationLink>> {
    let row = sqlx::query_as::<_, InvitationRow>(&format!(
        "SELECT {INVITATION_COLUMNS} FROM invitation_links WHERE token = $1"
    ))
    .bind(token)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    row.map(InvitationRow::into_invitation).transpose()
}

pub async fn mark_accepted_tx(
    conn: &mut PgConnection,
    invitation_id: Uuid,
    accepted_by: Uuid,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE invitation_links SET status = 'accepted', accepted_by = $2 WHERE id = $1",
    )
    .bind(invitation_id)
    .bind(accepted_by)
    .execute(conn)
    .await
    .map_err(map_db_error)?;

    Ok(())
}

pub async fn list_by_apartment(
    pool: &PgPool,
    apartment_id: Uuid,
) -> AppResult<Vec<InvitationWithAcceptor>> {
    #[derive(Debug, sqlx::FromRow)]
    struct Row {
        id: Uuid,
        apartment_id: Uuid,
        token: String,
        status: String,
        created_by: Uuid,
        accepted_by: Option<Uuid>,
        created_at: DateTime<Utc>,
        accepted_by_name: Option<String>,
    }

    let rows = sqlx::query_as::<_, Row>(
        "SELECT i.id, i.apartment_id, i.token, i.status, i.created_by,
                i.accepted_by, i.created_at, u.full_name AS accepted_by_name
         FROM invitation_links i
         LEFT JOIN users u ON u.id = i.accepted_by
         WHERE i.apartment_id = $1
         ORDER BY i.created_at DESC",
    )
    .bind(apartment_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)?;

    rows.into_iter()
        .map(|row| {
            Ok(InvitationWithAcceptor {
                invitation: InvitationLink {
                    id: row.id,
                    apartment_id: row.apartment_id,
                    token: row.token,
                    status: InvitationStatus::parse(&row.status)?,
                    created_by: row.created_by,
                    accepted_by: row.accepted_by,
                    created_at: row.created_at,
                },
                accepted_by_name: row.accepted_by_name,
            })
        })
        .collect()
}
