use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Role, User};
use crate::repository::users;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Resolves the request principal to a user record and role.
///
/// The identity provider only vouches for the principal id (`sub`); a
/// principal with no profile row cannot proceed, so a missing row is a
/// fatal per-request error rather than an implicit signup.
pub async fn require_user(state: &AppState, headers: &HeaderMap) -> AppResult<User> {
    let user_id = authenticated_principal(state, headers)?;
    users::find_by_id(state.db()?, user_id)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized("Unauthorized: user profile not found.".to_string())
        })
}

pub fn require_owner(user: &User) -> AppResult<()> {
    if user.role == Role::Owner {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "Forbidden: this action requires the owner role.".to_string(),
    ))
}

pub fn require_tenant(user: &User) -> AppResult<()> {
    if user.role == Role::Tenant {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "Forbidden: this action requires the tenant role.".to_string(),
    ))
}

fn authenticated_principal(state: &AppState, headers: &HeaderMap) -> AppResult<Uuid> {
    if state.config.auth_dev_overrides_enabled() {
        if let Some(raw) = headers.get("x-user-id").and_then(|value| value.to_str().ok()) {
            return Uuid::parse_str(raw.trim()).map_err(|_| {
                AppError::Unauthorized("Unauthorized: invalid x-user-id override.".to_string())
            });
        }
    }

    let token = bearer_token(headers)?;
    let secret = state.config.auth_jwt_secret.as_deref().ok_or_else(|| {
        AppError::Dependency("Auth is not configured. Set AUTH_JWT_SECRET.".to_string())
    })?;

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| AppError::Unauthorized("Unauthorized: invalid or expired token.".to_string()))?;

    Uuid::parse_str(decoded.claims.sub.trim())
        .map_err(|_| AppError::Unauthorized("Unauthorized: malformed subject claim.".to_string()))
}

fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("Unauthorized: missing bearer token.".to_string())
        })?;

    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized("Unauthorized: malformed Authorization header.".to_string())
        })?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::bearer_token;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn rejects_missing_and_malformed_headers() {
        assert!(bearer_token(&HeaderMap::new()).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert!(bearer_token(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer "),
        );
        assert!(bearer_token(&headers).is_err());
    }
}
