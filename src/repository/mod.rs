pub mod apartments;
pub mod charges;
pub mod invitations;
pub mod leases;
pub mod users;

use crate::error::{rules, AppError};

/// Maps store-level failures to the error taxonomy. Constraint violations
/// that back business invariants surface as business errors by constraint
/// name; everything else is an infrastructure failure, logged with context.
pub(crate) fn map_db_error(error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_error) = &error {
        match db_error.constraint() {
            Some("one_active_lease_per_apartment") => {
                return AppError::Rule(
                    rules::APARTMENT_HAS_LEASE,
                    "This apartment already has an active lease.".to_string(),
                )
            }
            Some("one_active_lease_per_tenant") => {
                return AppError::Rule(
                    rules::USER_HAS_LEASE,
                    "This user already holds an active lease.".to_string(),
                )
            }
            Some("one_pending_invitation_per_apartment") => {
                return AppError::Conflict(
                    "A pending invitation already exists for this apartment.".to_string(),
                )
            }
            _ => {}
        }

        let message = db_error.message();
        if message.contains("payments exceed charge amount") {
            return AppError::Rule(
                rules::PAYMENT_EXCEEDS_CHARGE,
                "Recorded payments cannot exceed the charge amount.".to_string(),
            );
        }
        if message.contains("apartment has existing leases") {
            return AppError::Rule(
                rules::APARTMENT_HAS_LEASES,
                "Cannot delete an apartment with existing leases.".to_string(),
            );
        }
        if db_error.code().as_deref() == Some("23505") {
            return AppError::Conflict(
                "Duplicate value violates a unique constraint.".to_string(),
            );
        }
    }

    tracing::error!(db_error = %error, "Database query failed");
    AppError::Dependency("Database operation failed.".to_string())
}
