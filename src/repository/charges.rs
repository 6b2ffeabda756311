use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::map_db_error;
use crate::error::AppResult;
use crate::models::{Charge, ChargeType, ChargeWithTotals, Payment};

#[derive(Debug, sqlx::FromRow)]
struct ChargeWithTotalsRow {
    id: Uuid,
    lease_id: Uuid,
    amount: f64,
    due_date: NaiveDate,
    charge_type: String,
    comment: Option<String>,
    attachment_path: Option<String>,
    created_at: DateTime<Utc>,
    total_paid: f64,
}

impl ChargeWithTotalsRow {
    fn into_charge_with_totals(self) -> AppResult<ChargeWithTotals> {
        Ok(ChargeWithTotals {
            charge: Charge {
                id: self.id,
                lease_id: self.lease_id,
                amount: self.amount,
                due_date: self.due_date,
                charge_type: ChargeType::parse(&self.charge_type)?,
                comment: self.comment,
                attachment_path: self.attachment_path,
                created_at: self.created_at,
            },
            total_paid: self.total_paid,
        })
    }
}

// total_paid is aggregated at read time; charge status is never stored.
const CHARGE_WITH_TOTALS_SELECT: &str =
    "SELECT c.id, c.lease_id, c.amount::float8 AS amount, c.due_date,
            c.type AS charge_type, c.comment, c.attachment_path, c.created_at,
            COALESCE(SUM(p.amount), 0)::float8 AS total_paid
     FROM charges c
     LEFT JOIN payments p ON p.charge_id = c.id";

pub async fn insert(
    pool: &PgPool,
    lease_id: Uuid,
    amount: f64,
    due_date: NaiveDate,
    charge_type: &str,
    comment: Option<&str>,
    created_by: Uuid,
) -> AppResult<ChargeWithTotals> {
    let row = sqlx::query_as::<_, ChargeWithTotalsRow>(
        "INSERT INTO charges (lease_id, amount, due_date, type, comment, created_by)
         VALUES ($1, $2::numeric(10,2), $3, $4, $5, $6)
         RETURNING id, lease_id, amount::float8 AS amount, due_date,
                   type AS charge_type, comment, attachment_path, created_at,
                   0::float8 AS total_paid",
    )
    .bind(lease_id)
    .bind(amount)
    .bind(due_date)
    .bind(charge_type)
    .bind(comment)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)?;

    row.into_charge_with_totals()
}

pub async fn find_with_totals(
    pool: &PgPool,
    charge_id: Uuid,
) -> AppResult<Option<ChargeWithTotals>> {
    let row = sqlx::query_as::<_, ChargeWithTotalsRow>(&format!(
        "{CHARGE_WITH_TOTALS_SELECT} WHERE c.id = $1 GROUP BY c.id"
    ))
    .bind(charge_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    row.map(ChargeWithTotalsRow::into_charge_with_totals)
        .transpose()
}

/// Charges for a lease, newest due date first; ties broken by id so the
/// order is deterministic.
pub async fn list_with_totals(pool: &PgPool, lease_id: Uuid) -> AppResult<Vec<ChargeWithTotals>> {
    let rows = sqlx::query_as::<_, ChargeWithTotalsRow>(&format!(
        "{CHARGE_WITH_TOTALS_SELECT}
         WHERE c.lease_id = $1
         GROUP BY c.id
         ORDER BY c.due_date DESC, c.id DESC"
    ))
    .bind(lease_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)?;

    rows.into_iter()
        .map(ChargeWithTotalsRow::into_charge_with_totals)
        .collect()
}

/// Partial update. `comment` is double-optional so callers can distinguish
/// "leave unchanged" from "clear".
pub async fn update(
    pool: &PgPool,
    charge_id: Uuid,
    amount: Option<f64>,
    due_date: Option<NaiveDate>,
    charge_type: Option<&str>,
    comment: Option<Option<&str>>,
) -> AppResult<Option<ChargeWithTotals>> {
    let comment_set = comment.is_some();
    let comment_value = comment.flatten();

    let row = sqlx::query_as::<_, ChargeWithTotalsRow>(
        "UPDATE charges
         SET amount = COALESCE($2::numeric(10,2), amount),
             due_date = COALESCE($3, due_date),
             type = COALESCE($4, type),
             comment = CASE WHEN $5 THEN $6 ELSE comment END
         WHERE id = $1
         RETURNING id, lease_id, amount::float8 AS amount, due_date,
                   type AS charge_type, comment, attachment_path, created_at,
                   (SELECT COALESCE(SUM(p.amount), 0)::float8
                      FROM payments p WHERE p.charge_id = charges.id) AS total_paid",
    )
    .bind(charge_id)
    .bind(amount)
    .bind(due_date)
    .bind(charge_type)
    .bind(comment_set)
    .bind(comment_value)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    row.map(ChargeWithTotalsRow::into_charge_with_totals)
        .transpose()
}

/// Deletes the charge; payments cascade at the store level.
pub async fn delete(pool: &PgPool, charge_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM charges WHERE id = $1")
        .bind(charge_id)
        .execute(pool)
        .await
        .map_err(map_db_error)?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_attachment_path(
    pool: &PgPool,
    charge_id: Uuid,
    attachment_path: Option<&str>,
) -> AppResult<()> {
    sqlx::query("UPDATE charges SET attachment_path = $2 WHERE id = $1")
        .bind(charge_id)
        .bind(attachment_path)
        .execute(pool)
        .await
        .map_err(map_db_error)?;

    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    charge_id: Uuid,
    amount: f64,
    payment_date: NaiveDate,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            charge_id: row.charge_id,
            amount: row.amount,
            payment_date: row.payment_date,
            created_at: row.created_at,
        }
    }
}

/// Append-only; the store trigger rejects a payment that would push the
/// sum over the charge amount.
pub async fn insert_payment(
    pool: &PgPool,
    charge_id: Uuid,
    amount: f64,
    payment_date: NaiveDate,
    created_by: Uuid,
) -> AppResult<Payment> {
    let row = sqlx::query_as::<_, PaymentRow>(
        "INSERT INTO payments (charge_id, amount, payment_date, created_by)
         VALUES ($1, $2::numeric(10,2), $3, $4)
         RETURNING id, charge_id, amount::float8 AS amount, payment_date, created_at",
    )
    .bind(charge_id)
    .bind(amount)
    .bind(payment_date)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)?;

    Ok(row.into())
}

pub async fn list_payments(pool: &PgPool, charge_id: Uuid) -> AppResult<Vec<Payment>> {
    let rows = sqlx::query_as::<_, PaymentRow>(
        "SELECT id, charge_id, amount::float8 AS amount, payment_date, created_at
         FROM payments
         WHERE charge_id = $1
         ORDER BY payment_date DESC, created_at DESC",
    )
    .bind(charge_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Ownership context for a charge: its lease, apartment, and the parties
/// allowed to see it. Every charge access rule starts here.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChargeContext {
    pub charge_id: Uuid,
    pub lease_id: Uuid,
    pub apartment_id: Uuid,
    pub owner_id: Uuid,
    pub tenant_id: Uuid,
    pub attachment_path: Option<String>,
}

pub async fn find_context(pool: &PgPool, charge_id: Uuid) -> AppResult<Option<ChargeContext>> {
    let row = sqlx::query_as::<_, ChargeContext>(
        "SELECT c.id AS charge_id, l.id AS lease_id, a.id AS apartment_id,
                a.owner_id, l.tenant_id, c.attachment_path
         FROM charges c
         JOIN leases l ON l.id = c.lease_id
         JOIN apartments a ON a.id = l.apartment_id
         WHERE c.id = $1",
    )
    .bind(charge_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    Ok(row)
}
