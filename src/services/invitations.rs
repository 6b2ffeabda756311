//! Invitation lifecycle: create, validate, accept.
//!
//! Tokens are single-use capabilities. Creating a new link expires every
//! pending one for the same apartment in the same transaction, so at most
//! one link is redeemable per apartment at any time. A token never becomes
//! pending again once accepted or expired.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{rules, AppError, AppResult};
use crate::models::{Apartment, InvitationLink, InvitationStatus, Lease, User};
use crate::repository::{apartments, invitations, leases, map_db_error, users};

/// What an invited person may see before authenticating: enough to decide
/// whether to sign up, and nothing else.
#[derive(Debug, Clone)]
pub struct InvitationPreview {
    pub apartment_name: String,
    pub apartment_address: String,
    pub owner_full_name: String,
}

pub fn invitation_url(config: &AppConfig, token: &str) -> String {
    format!(
        "{}/register/tenant?token={token}",
        config.app_public_url.trim_end_matches('/')
    )
}

/// Creates a fresh invitation link for an apartment. Refused while the
/// apartment has an active lease; supersedes any pending link.
pub async fn create(pool: &PgPool, apartment: &Apartment, owner: &User) -> AppResult<InvitationLink> {
    if leases::find_active_by_apartment(pool, apartment.id)
        .await?
        .is_some()
    {
        return Err(AppError::Rule(
            rules::ACTIVE_LEASE_EXISTS,
            "This apartment already has an active lease.".to_string(),
        ));
    }

    let token = Uuid::new_v4().to_string();

    let mut tx = pool.begin().await.map_err(map_db_error)?;
    invitations::expire_pending_tx(&mut *tx, apartment.id).await?;
    let invitation = invitations::insert_pending_tx(&mut *tx, apartment.id, &token, owner.id).await?;
    tx.commit().await.map_err(map_db_error)?;

    Ok(invitation)
}

/// Resolves a token to its preview. Unknown, accepted and expired tokens
/// are indistinguishable to the caller.
pub async fn validate(pool: &PgPool, token: &str) -> AppResult<InvitationPreview> {
    let invitation = find_pending(pool, token).await?;

    let apartment = apartments::find_by_id(pool, invitation.apartment_id)
        .await?
        .ok_or_else(invalid_token)?;
    let owner = users::find_by_id(pool, apartment.owner_id)
        .await?
        .ok_or_else(invalid_token)?;

    Ok(InvitationPreview {
        apartment_name: apartment.name,
        apartment_address: apartment.address,
        owner_full_name: owner.full_name,
    })
}

/// Redeems a token for the calling tenant: creates the active lease and
/// marks the link accepted, atomically. The partial unique indexes close
/// the race where two tenants redeem links for one apartment.
pub async fn accept(pool: &PgPool, token: &str, tenant: &User) -> AppResult<Lease> {
    let invitation = find_pending(pool, token).await?;

    if leases::find_active_by_tenant(pool, tenant.id).await?.is_some() {
        return Err(AppError::Rule(
            rules::USER_HAS_LEASE,
            "You already hold an active lease.".to_string(),
        ));
    }

    let start_date = Utc::now().date_naive();

    let mut tx = pool.begin().await.map_err(map_db_error)?;
    let lease =
        leases::insert_active_tx(&mut *tx, invitation.apartment_id, tenant.id, start_date).await?;
    invitations::mark_accepted_tx(&mut *tx, invitation.id, tenant.id).await?;
    tx.commit().await.map_err(map_db_error)?;

    Ok(lease)
}

async fn find_pending(pool: &PgPool, token: &str) -> AppResult<InvitationLink> {
    let invitation = invitations::find_by_token(pool, token)
        .await?
        .ok_or_else(invalid_token)?;
    ensure_pending(&invitation)?;
    Ok(invitation)
}

/// Only pending links are redeemable. Accepted and expired ones fail the
/// same way an unknown token does.
fn ensure_pending(invitation: &InvitationLink) -> AppResult<()> {
    if invitation.status != InvitationStatus::Pending {
        return Err(invalid_token());
    }
    Ok(())
}

fn invalid_token() -> AppError {
    AppError::Rule(
        rules::INVALID_TOKEN,
        "This invitation link is invalid or no longer active.".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::{ensure_pending, invitation_url};
    use crate::config::AppConfig;
    use crate::error::{rules, AppError};
    use crate::models::{InvitationLink, InvitationStatus};
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    fn link(status: InvitationStatus) -> InvitationLink {
        InvitationLink {
            id: Uuid::new_v4(),
            apartment_id: Uuid::new_v4(),
            token: Uuid::new_v4().to_string(),
            status,
            created_by: Uuid::new_v4(),
            accepted_by: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn builds_register_url_without_double_slash() {
        let mut config = AppConfig::from_env();
        config.app_public_url = "https://app.rentbook.test/".to_string();
        assert_eq!(
            invitation_url(&config, "tok-123"),
            "https://app.rentbook.test/register/tenant?token=tok-123"
        );
    }

    #[test]
    fn pending_links_are_redeemable() {
        assert!(ensure_pending(&link(InvitationStatus::Pending)).is_ok());
    }

    #[test]
    fn accepted_and_expired_links_fail_as_invalid_tokens() {
        for status in [InvitationStatus::Accepted, InvitationStatus::Expired] {
            match ensure_pending(&link(status)) {
                Err(AppError::Rule(code, _)) => assert_eq!(code, rules::INVALID_TOKEN),
                other => panic!("expected INVALID_TOKEN rule, got {other:?}"),
            }
        }
    }
}
