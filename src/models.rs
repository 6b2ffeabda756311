use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

/// Role is fixed at signup and read-only input to every authorization
/// check; it is never inferred from request content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Tenant,
}

impl Role {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "owner" => Ok(Self::Owner),
            "tenant" => Ok(Self::Tenant),
            other => Err(AppError::Internal(format!("Unknown user role '{other}'."))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseStatus {
    Active,
    Archived,
}

impl LeaseStatus {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            other => Err(AppError::Internal(format!(
                "Unknown lease status '{other}'."
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
}

impl InvitationStatus {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "expired" => Ok(Self::Expired),
            other => Err(AppError::Internal(format!(
                "Unknown invitation status '{other}'."
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeType {
    Rent,
    Bill,
    Other,
}

impl ChargeType {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "rent" => Ok(Self::Rent),
            "bill" => Ok(Self::Bill),
            "other" => Ok(Self::Other),
            other => Err(AppError::Internal(format!(
                "Unknown charge type '{other}'."
            ))),
        }
    }
}

/// Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "unpaid" => Ok(Self::Unpaid),
            "partially_paid" => Ok(Self::PartiallyPaid),
            "paid" => Ok(Self::Paid),
            other => Err(AppError::BadRequest(format!(
                "Unknown payment status '{other}'."
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Apartment {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Lease {
    pub id: Uuid,
    pub apartment_id: Uuid,
    pub tenant_id: Uuid,
    pub status: LeaseStatus,
    pub start_date: NaiveDate,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvitationLink {
    pub id: Uuid,
    pub apartment_id: Uuid,
    pub token: String,
    pub status: InvitationStatus,
    pub created_by: Uuid,
    pub accepted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Charge {
    pub id: Uuid,
    pub lease_id: Uuid,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub charge_type: ChargeType,
    pub comment: Option<String>,
    pub attachment_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Charge plus the payment sum it was read with. Status derivation is a
/// pure function over this (see `services::charge_status`), recomputed on
/// every read.
#[derive(Debug, Clone)]
pub struct ChargeWithTotals {
    pub charge: Charge,
    pub total_paid: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub charge_id: Uuid,
    pub amount: f64,
    pub payment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}
