use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    auth::require_user,
    error::{rules, AppError, AppResult},
    models::{ChargeWithTotals, Lease, PaymentStatus, Role, User},
    repository::charges::{self, ChargeContext},
    repository::leases,
    routes::apartments::{apartment_not_found, require_owned_apartment},
    schemas::{
        validate_amount, ChargePath, ChargesQuery, CreateChargeInput, CreatePaymentInput,
        UpdateChargeInput,
    },
    services::{attachments, charge_status, charge_status::ChargeStatus},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/apartments/{apartment_id}/charges",
            axum::routing::get(list_charges).post(create_charge),
        )
        .route(
            "/charges/{charge_id}",
            axum::routing::get(get_charge)
                .patch(update_charge)
                .delete(delete_charge),
        )
        .route(
            "/charges/{charge_id}/payments",
            axum::routing::post(create_payment),
        )
        .route(
            "/charges/{charge_id}/attachment",
            axum::routing::post(set_attachment).delete(remove_attachment),
        )
}

pub(crate) fn charge_json(
    entry: &ChargeWithTotals,
    derived: ChargeStatus,
    attachment_url: Option<String>,
) -> Value {
    json!({
        "id": entry.charge.id,
        "lease_id": entry.charge.lease_id,
        "amount": entry.charge.amount,
        "due_date": entry.charge.due_date,
        "type": entry.charge.charge_type,
        "comment": entry.charge.comment,
        "payment_status": derived.status,
        "total_paid": derived.total_paid,
        "remaining_amount": derived.remaining_amount,
        "is_overdue": derived.is_overdue,
        "has_attachment": entry.charge.attachment_path.is_some(),
        "attachment_url": attachment_url,
        "created_at": entry.charge.created_at,
    })
}

fn charge_not_found() -> AppError {
    AppError::NotFound("Charge not found.".to_string())
}

/// Resolves a charge the caller may see: the apartment's owner or the
/// lease's tenant. Anyone else learns nothing about its existence.
async fn require_charge_access(
    state: &AppState,
    user: &User,
    charge_id: Uuid,
) -> AppResult<ChargeContext> {
    let ctx = charges::find_context(state.db()?, charge_id)
        .await?
        .ok_or_else(charge_not_found)?;

    let visible = match user.role {
        Role::Owner => ctx.owner_id == user.id,
        Role::Tenant => ctx.tenant_id == user.id,
    };
    if !visible {
        return Err(charge_not_found());
    }
    Ok(ctx)
}

/// Mutations are owner-only on top of visibility.
async fn require_charge_owner(
    state: &AppState,
    user: &User,
    charge_id: Uuid,
) -> AppResult<ChargeContext> {
    crate::auth::require_owner(user)?;
    require_charge_access(state, user, charge_id).await
}

/// Resolves the lease a charge listing is scoped to, per caller role. An
/// explicit `lease_id` selects a historical lease; otherwise the
/// apartment's active lease is the target.
async fn resolve_lease_scope(
    state: &AppState,
    user: &User,
    apartment_id: Uuid,
    explicit_lease_id: Option<Uuid>,
) -> AppResult<Lease> {
    let pool = state.db()?;
    match user.role {
        Role::Owner => {
            let apartment = require_owned_apartment(state, user, apartment_id).await?;
            match explicit_lease_id {
                Some(lease_id) => leases::find_by_id(pool, lease_id)
                    .await?
                    .filter(|lease| lease.apartment_id == apartment.id)
                    .ok_or_else(|| AppError::NotFound("Lease not found.".to_string())),
                None => leases::find_active_by_apartment(pool, apartment.id)
                    .await?
                    .ok_or_else(no_active_lease),
            }
        }
        Role::Tenant => {
            // A tenant only ever sees leases of their own.
            match explicit_lease_id {
                Some(lease_id) => leases::find_by_id(pool, lease_id)
                    .await?
                    .filter(|lease| {
                        lease.tenant_id == user.id && lease.apartment_id == apartment_id
                    })
                    .ok_or_else(apartment_not_found),
                None => leases::find_active_by_tenant(pool, user.id)
                    .await?
                    .filter(|lease| lease.apartment_id == apartment_id)
                    .ok_or_else(apartment_not_found),
            }
        }
    }
}

fn no_active_lease() -> AppError {
    AppError::Rule(
        rules::NO_ACTIVE_LEASE,
        "This apartment has no active lease.".to_string(),
    )
}

/// Charges for a lease, grouped by due month (newest first), with derived
/// status filters applied.
async fn list_charges(
    State(state): State<AppState>,
    Path(path): Path<crate::schemas::ApartmentPath>,
    Query(query): Query<ChargesQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    query.validate_fields()?;
    let lease = resolve_lease_scope(&state, &user, path.apartment_id, query.lease_id).await?;

    let today = Utc::now().date_naive();
    let status_filter = query.parsed_status()?;
    let filters = charge_status::ChargeFilters {
        month: query.month.as_deref(),
        status: status_filter,
        overdue: query.overdue,
    };

    let rows = charges::list_with_totals(state.db()?, lease.id).await?;
    let filtered: Vec<(ChargeWithTotals, ChargeStatus)> = rows
        .into_iter()
        .map(|entry| {
            let derived = charge_status::derive_for(&entry, today);
            (entry, derived)
        })
        .filter(|(entry, derived)| charge_status::matches(entry, *derived, filters))
        .collect();

    let months: Vec<Value> = charge_status::group_by_month(filtered)
        .into_iter()
        .map(|(month, entries)| {
            json!({
                "month": month,
                "charges": entries
                    .iter()
                    .map(|(entry, derived)| charge_json(entry, *derived, None))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    Ok(Json(json!({ "data": months, "lease_id": lease.id })))
}

async fn create_charge(
    State(state): State<AppState>,
    Path(path): Path<crate::schemas::ApartmentPath>,
    headers: HeaderMap,
    Json(payload): Json<CreateChargeInput>,
) -> AppResult<impl IntoResponse> {
    let user = require_user(&state, &headers).await?;
    let apartment = require_owned_apartment(&state, &user, path.apartment_id).await?;
    payload.validate_fields()?;

    let pool = state.db()?;
    let lease = leases::find_active_by_apartment(pool, apartment.id)
        .await?
        .ok_or_else(no_active_lease)?;

    let created = charges::insert(
        pool,
        lease.id,
        payload.amount,
        payload.due_date,
        &payload.charge_type,
        payload.comment.as_deref().map(str::trim),
        user.id,
    )
    .await?;

    let derived = charge_status::derive_for(&created, Utc::now().date_naive());
    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({ "data": charge_json(&created, derived, None) })),
    ))
}

/// Charge detail: derived status, payment history, and a short-lived
/// download URL when an attachment is bound.
async fn get_charge(
    State(state): State<AppState>,
    Path(path): Path<ChargePath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let ctx = require_charge_access(&state, &user, path.charge_id).await?;

    let pool = state.db()?;
    let entry = charges::find_with_totals(pool, ctx.charge_id)
        .await?
        .ok_or_else(charge_not_found)?;
    let payments = charges::list_payments(pool, ctx.charge_id).await?;

    let attachment_url = match &entry.charge.attachment_path {
        Some(key) => Some(state.attachments()?.presigned_get_url(key).await?),
        None => None,
    };

    let derived = charge_status::derive_for(&entry, Utc::now().date_naive());
    Ok(Json(json!({
        "data": charge_json(&entry, derived, attachment_url),
        "payments": payments,
    })))
}

async fn update_charge(
    State(state): State<AppState>,
    Path(path): Path<ChargePath>,
    headers: HeaderMap,
    Json(payload): Json<UpdateChargeInput>,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let ctx = require_charge_owner(&state, &user, path.charge_id).await?;
    payload.validate_fields()?;

    let pool = state.db()?;
    let current = charges::find_with_totals(pool, ctx.charge_id)
        .await?
        .ok_or_else(charge_not_found)?;
    let derived = charge_status::derive_for(&current, Utc::now().date_naive());

    // A fully paid charge is immutable; its payment history is settled.
    if derived.status == PaymentStatus::Paid {
        return Err(AppError::Rule(
            rules::CHARGE_FULLY_PAID,
            "A fully paid charge cannot be modified.".to_string(),
        ));
    }
    if let Some(amount) = payload.amount {
        if amount + charge_status::CENT_EPSILON < derived.total_paid {
            return Err(AppError::Rule(
                rules::AMOUNT_TOO_LOW,
                "Amount cannot be lower than the payments already recorded.".to_string(),
            ));
        }
    }

    let updated = charges::update(
        pool,
        ctx.charge_id,
        payload.amount,
        payload.due_date,
        payload.charge_type.as_deref(),
        payload
            .comment
            .as_ref()
            .map(|comment| comment.as_deref().map(str::trim)),
    )
    .await?
    .ok_or_else(charge_not_found)?;

    let derived = charge_status::derive_for(&updated, Utc::now().date_naive());
    Ok(Json(json!({ "data": charge_json(&updated, derived, None) })))
}

async fn delete_charge(
    State(state): State<AppState>,
    Path(path): Path<ChargePath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let ctx = require_charge_owner(&state, &user, path.charge_id).await?;

    let pool = state.db()?;
    let current = charges::find_with_totals(pool, ctx.charge_id)
        .await?
        .ok_or_else(charge_not_found)?;
    let derived = charge_status::derive_for(&current, Utc::now().date_naive());

    if derived.status == PaymentStatus::Paid {
        return Err(AppError::Rule(
            rules::CANNOT_DELETE_PAID_CHARGE,
            "A fully paid charge cannot be deleted.".to_string(),
        ));
    }

    // Attachment removal must not block the delete.
    if let (Some(key), Some(storage)) = (&current.charge.attachment_path, &state.storage) {
        storage.delete_object_best_effort(key).await;
    }

    let deleted = charges::delete(pool, ctx.charge_id).await?;
    if !deleted {
        return Err(charge_not_found());
    }

    Ok(Json(json!({ "data": { "deleted": true } })))
}

async fn create_payment(
    State(state): State<AppState>,
    Path(path): Path<ChargePath>,
    headers: HeaderMap,
    Json(payload): Json<CreatePaymentInput>,
) -> AppResult<impl IntoResponse> {
    let user = require_user(&state, &headers).await?;
    let ctx = require_charge_owner(&state, &user, path.charge_id).await?;
    validate_amount(payload.amount)?;

    let pool = state.db()?;
    let current = charges::find_with_totals(pool, ctx.charge_id)
        .await?
        .ok_or_else(charge_not_found)?;
    let derived = charge_status::derive_for(&current, Utc::now().date_naive());

    // Pre-check; the store trigger enforces the same bound under races.
    if payload.amount > derived.remaining_amount + charge_status::CENT_EPSILON {
        return Err(AppError::Rule(
            rules::PAYMENT_EXCEEDS_CHARGE,
            "Recorded payments cannot exceed the charge amount.".to_string(),
        ));
    }

    let payment = charges::insert_payment(
        pool,
        ctx.charge_id,
        payload.amount,
        payload.payment_date,
        user.id,
    )
    .await?;

    let refreshed = charges::find_with_totals(pool, ctx.charge_id)
        .await?
        .ok_or_else(charge_not_found)?;
    let derived = charge_status::derive_for(&refreshed, Utc::now().date_naive());

    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({
            "data": {
                "payment": payment,
                "charge": charge_json(&refreshed, derived, None),
            }
        })),
    ))
}

async fn set_attachment(
    State(state): State<AppState>,
    Path(path): Path<ChargePath>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let ctx = require_charge_owner(&state, &user, path.charge_id).await?;

    let (content_type, bytes) = read_file_field(&mut multipart).await?;
    attachments::validate_size(bytes.len())?;

    let storage = state.attachments()?;
    let key = attachments::set_attachment(
        state.db()?,
        storage,
        ctx.apartment_id,
        ctx.charge_id,
        ctx.attachment_path.as_deref(),
        &content_type,
        bytes,
    )
    .await?;

    let attachment_url = storage.presigned_get_url(&key).await?;
    Ok(Json(json!({
        "data": { "attachment_path": key, "attachment_url": attachment_url }
    })))
}

async fn remove_attachment(
    State(state): State<AppState>,
    Path(path): Path<ChargePath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let ctx = require_charge_owner(&state, &user, path.charge_id).await?;

    attachments::remove_attachment(
        state.db()?,
        state.attachments()?,
        ctx.charge_id,
        ctx.attachment_path.as_deref(),
    )
    .await?;

    Ok(Json(json!({ "data": { "deleted": true } })))
}

async fn read_file_field(multipart: &mut Multipart) -> AppResult<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| AppError::BadRequest(format!("Malformed multipart body: {error}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                AppError::BadRequest("The file part must declare a content type.".to_string())
            })?;
        let bytes = field
            .bytes()
            .await
            .map_err(|error| AppError::BadRequest(format!("Failed to read upload: {error}")))?;
        return Ok((content_type, bytes.to_vec()));
    }

    Err(AppError::BadRequest(
        "Multipart body must contain a 'file' part.".to_string(),
    ))
}
