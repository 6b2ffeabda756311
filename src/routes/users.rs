use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::{
    auth::require_user,
    error::{AppError, AppResult},
    repository::users,
    schemas::{validate_input, UpdateUserInput},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route(
        "/users/me",
        axum::routing::get(get_me).patch(update_me),
    )
}

async fn get_me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    Ok(Json(json!({ "data": user })))
}

async fn update_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateUserInput>,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    validate_input(&payload)?;

    let updated = users::update_full_name(state.db()?, user.id, payload.full_name.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    Ok(Json(json!({ "data": updated })))
}
