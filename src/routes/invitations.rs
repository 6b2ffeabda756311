use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::{require_tenant, require_user},
    error::AppResult,
    routes::apartments::require_owned_apartment,
    schemas::{ApartmentPath, TokenPath},
    services::invitations,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/apartments/{apartment_id}/invitations",
            axum::routing::get(list_invitations).post(create_invitation),
        )
        .route("/invitations/{token}", axum::routing::get(validate_token))
        .route(
            "/invitations/{token}/accept",
            axum::routing::post(accept_invitation),
        )
}

async fn create_invitation(
    State(state): State<AppState>,
    Path(path): Path<ApartmentPath>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user = require_user(&state, &headers).await?;
    let apartment = require_owned_apartment(&state, &user, path.apartment_id).await?;

    let invitation = invitations::create(state.db()?, &apartment, &user).await?;
    let url = invitations::invitation_url(&state.config, &invitation.token);

    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({ "data": { "invitation": invitation, "url": url } })),
    ))
}

async fn list_invitations(
    State(state): State<AppState>,
    Path(path): Path<ApartmentPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let apartment = require_owned_apartment(&state, &user, path.apartment_id).await?;

    let history = crate::repository::invitations::list_by_apartment(state.db()?, apartment.id)
        .await?;
    let data: Vec<Value> = history
        .iter()
        .map(|entry| {
            json!({
                "id": entry.invitation.id,
                "token": entry.invitation.token,
                "status": entry.invitation.status,
                "created_at": entry.invitation.created_at,
                "accepted_by_name": entry.accepted_by_name,
            })
        })
        .collect();

    Ok(Json(json!({ "data": data })))
}

/// Public endpoint. Reveals only what an invited person needs to decide:
/// apartment name and address, and who is inviting them.
async fn validate_token(
    State(state): State<AppState>,
    Path(path): Path<TokenPath>,
) -> AppResult<Json<Value>> {
    let preview = invitations::validate(state.db()?, &path.token).await?;

    Ok(Json(json!({
        "data": {
            "apartment_name": preview.apartment_name,
            "apartment_address": preview.apartment_address,
            "owner_full_name": preview.owner_full_name,
        }
    })))
}

async fn accept_invitation(
    State(state): State<AppState>,
    Path(path): Path<TokenPath>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user = require_user(&state, &headers).await?;
    require_tenant(&user)?;

    let lease = invitations::accept(state.db()?, &path.token, &user).await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({ "data": { "lease": lease } })),
    ))
}
