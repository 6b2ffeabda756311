use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::{require_owner, require_user},
    error::{rules, AppError, AppResult},
    repository::{apartments, leases},
    schemas::LeasePath,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route(
        "/leases/{lease_id}/archive",
        axum::routing::post(archive_lease),
    )
}

/// Ends a tenancy: `active -> archived`, freeing both the apartment and
/// the tenant for a new lease.
async fn archive_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    require_owner(&user)?;
    let pool = state.db()?;

    let lease = leases::find_by_id(pool, path.lease_id)
        .await?
        .ok_or_else(lease_not_found)?;
    let apartment = apartments::find_by_id(pool, lease.apartment_id)
        .await?
        .ok_or_else(lease_not_found)?;
    if apartment.owner_id != user.id {
        return Err(lease_not_found());
    }

    let archived = leases::archive(pool, lease.id).await?.ok_or_else(|| {
        AppError::Rule(
            rules::LEASE_NOT_ACTIVE,
            "Only an active lease can be archived.".to_string(),
        )
    })?;

    Ok(Json(json!({ "data": archived })))
}

fn lease_not_found() -> AppError {
    AppError::NotFound("Lease not found.".to_string())
}
