use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    auth::{require_owner, require_user},
    error::{AppError, AppResult},
    models::{Apartment, User},
    repository::{apartments, charges, leases, users},
    routes::charges::charge_json,
    schemas::{validate_input, ApartmentPath, ApartmentsQuery, CreateApartmentInput, UpdateApartmentInput},
    services::charge_status,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/apartments",
            axum::routing::get(list_apartments).post(create_apartment),
        )
        .route(
            "/apartments/{apartment_id}",
            axum::routing::get(get_apartment)
                .patch(update_apartment)
                .delete(delete_apartment),
        )
        .route(
            "/apartments/{apartment_id}/summary",
            axum::routing::get(get_apartment_summary),
        )
}

/// Resolves an apartment the caller owns. A missing apartment and someone
/// else's apartment are indistinguishable to the caller.
pub(crate) async fn require_owned_apartment(
    state: &AppState,
    user: &User,
    apartment_id: uuid::Uuid,
) -> AppResult<Apartment> {
    require_owner(user)?;
    let apartment = apartments::find_by_id(state.db()?, apartment_id)
        .await?
        .ok_or_else(apartment_not_found)?;
    if apartment.owner_id != user.id {
        return Err(apartment_not_found());
    }
    Ok(apartment)
}

pub(crate) fn apartment_not_found() -> AppError {
    AppError::NotFound("Apartment not found.".to_string())
}

pub(crate) fn lease_with_tenant_json(entry: &crate::repository::leases::LeaseWithTenant) -> Value {
    json!({
        "id": entry.lease.id,
        "status": entry.lease.status,
        "start_date": entry.lease.start_date,
        "archived_at": entry.lease.archived_at,
        "tenant": {
            "id": entry.lease.tenant_id,
            "full_name": entry.tenant_full_name,
            "email": entry.tenant_email,
        },
    })
}

async fn create_apartment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateApartmentInput>,
) -> AppResult<impl IntoResponse> {
    let user = require_user(&state, &headers).await?;
    require_owner(&user)?;
    validate_input(&payload)?;

    let apartment = apartments::insert(
        state.db()?,
        payload.name.trim(),
        payload.address.trim(),
        user.id,
    )
    .await?;

    Ok((axum::http::StatusCode::CREATED, Json(json!({ "data": apartment }))))
}

/// Role-shaped listing: an owner sees their portfolio with current (or,
/// with `include_archived`, latest) lease info; a tenant sees the single
/// apartment they lease, with the owner's contact identity.
async fn list_apartments(
    State(state): State<AppState>,
    Query(query): Query<ApartmentsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let pool = state.db()?;

    match user.role {
        crate::models::Role::Owner => {
            let owned = apartments::list_by_owner(pool, user.id).await?;
            let mut data = Vec::with_capacity(owned.len());
            for apartment in owned {
                let lease =
                    leases::find_latest_with_tenant(pool, apartment.id, query.include_archived)
                        .await?;
                data.push(json!({
                    "apartment": apartment,
                    "lease": lease.as_ref().map(lease_with_tenant_json),
                }));
            }
            Ok(Json(json!({ "data": data })))
        }
        crate::models::Role::Tenant => {
            let Some(lease) = leases::find_active_by_tenant(pool, user.id).await? else {
                return Ok(Json(json!({ "data": [] })));
            };
            let apartment = apartments::find_by_id(pool, lease.apartment_id)
                .await?
                .ok_or_else(apartment_not_found)?;
            let owner = users::find_by_id(pool, apartment.owner_id)
                .await?
                .ok_or_else(apartment_not_found)?;
            Ok(Json(json!({
                "data": [{
                    "apartment": apartment,
                    "lease": lease,
                    "owner": { "id": owner.id, "full_name": owner.full_name, "email": owner.email },
                }]
            })))
        }
    }
}

async fn get_apartment(
    State(state): State<AppState>,
    Path(path): Path<ApartmentPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let pool = state.db()?;

    match user.role {
        crate::models::Role::Owner => {
            let apartment = require_owned_apartment(&state, &user, path.apartment_id).await?;
            let lease_history = leases::list_by_apartment(pool, apartment.id).await?;
            Ok(Json(json!({
                "data": {
                    "apartment": apartment,
                    "leases": lease_history.iter().map(lease_with_tenant_json).collect::<Vec<_>>(),
                }
            })))
        }
        crate::models::Role::Tenant => {
            // Visible only through the tenant's own active lease.
            let lease = leases::find_active_by_tenant(pool, user.id)
                .await?
                .filter(|lease| lease.apartment_id == path.apartment_id)
                .ok_or_else(apartment_not_found)?;
            let apartment = apartments::find_by_id(pool, lease.apartment_id)
                .await?
                .ok_or_else(apartment_not_found)?;
            let owner = users::find_by_id(pool, apartment.owner_id)
                .await?
                .ok_or_else(apartment_not_found)?;
            Ok(Json(json!({
                "data": {
                    "apartment": apartment,
                    "lease": lease,
                    "owner": { "id": owner.id, "full_name": owner.full_name, "email": owner.email },
                }
            })))
        }
    }
}

async fn update_apartment(
    State(state): State<AppState>,
    Path(path): Path<ApartmentPath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateApartmentInput>,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let apartment = require_owned_apartment(&state, &user, path.apartment_id).await?;
    validate_input(&payload)?;
    if payload.is_empty() {
        return Err(AppError::Validation(
            "At least one field must be provided.".to_string(),
        ));
    }

    let updated = apartments::update(
        state.db()?,
        apartment.id,
        payload.name.as_deref().map(str::trim),
        payload.address.as_deref().map(str::trim),
    )
    .await?
    .ok_or_else(apartment_not_found)?;

    Ok(Json(json!({ "data": updated })))
}

async fn delete_apartment(
    State(state): State<AppState>,
    Path(path): Path<ApartmentPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let apartment = require_owned_apartment(&state, &user, path.apartment_id).await?;

    let deleted = apartments::delete(state.db()?, apartment.id).await?;
    if !deleted {
        return Err(apartment_not_found());
    }

    Ok(Json(json!({ "data": { "deleted": true } })))
}

/// Financial snapshot of the apartment's current lease: outstanding and
/// overdue totals plus the next few open charges.
async fn get_apartment_summary(
    State(state): State<AppState>,
    Path(path): Path<ApartmentPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let apartment = require_owned_apartment(&state, &user, path.apartment_id).await?;
    let pool = state.db()?;

    let Some(lease) = leases::find_active_with_tenant(pool, apartment.id).await? else {
        return Ok(Json(json!({
            "data": { "apartment": apartment, "lease": null, "summary": null }
        })));
    };

    let today = Utc::now().date_naive();
    let lease_charges = charges::list_with_totals(pool, lease.lease.id).await?;
    let totals = charge_status::due_totals(&lease_charges, today);
    let upcoming: Vec<Value> = charge_status::upcoming(&lease_charges, today, 5)
        .into_iter()
        .map(|(charge, derived)| charge_json(&charge, derived, None))
        .collect();

    Ok(Json(json!({
        "data": {
            "apartment": apartment,
            "lease": lease_with_tenant_json(&lease),
            "summary": {
                "total_unpaid": totals.total_unpaid,
                "total_overdue": totals.total_overdue,
                "upcoming_charges": upcoming,
            },
        }
    })))
}
