use axum::{routing::get, Router};

use crate::state::AppState;

pub mod apartments;
pub mod charges;
pub mod dashboard;
pub mod health;
pub mod invitations;
pub mod leases;
pub mod users;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(users::router())
        .merge(apartments::router())
        .merge(invitations::router())
        .merge(leases::router())
        .merge(charges::router())
        .merge(dashboard::router())
}
