use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    auth::require_user,
    error::AppResult,
    models::{Role, User},
    repository::{apartments, charges, leases, users},
    routes::apartments::lease_with_tenant_json,
    routes::charges::charge_json,
    services::charge_status,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/dashboard", axum::routing::get(dashboard))
}

/// Role-shaped dashboard payload: portfolio statistics for an owner, the
/// current lease and dues for a tenant.
async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    match user.role {
        Role::Owner => owner_dashboard(&state, &user).await,
        Role::Tenant => tenant_dashboard(&state, &user).await,
    }
}

async fn owner_dashboard(state: &AppState, user: &User) -> AppResult<Json<Value>> {
    let pool = state.db()?;
    let today = Utc::now().date_naive();
    let owned = apartments::list_by_owner(pool, user.id).await?;

    let mut entries = Vec::with_capacity(owned.len());
    let mut active_leases = 0usize;
    let mut total_unpaid = 0.0;
    let mut total_overdue = 0.0;

    for apartment in owned {
        let lease = leases::find_active_with_tenant(pool, apartment.id).await?;
        let summary = match &lease {
            Some(lease) => {
                active_leases += 1;
                let lease_charges = charges::list_with_totals(pool, lease.lease.id).await?;
                let totals = charge_status::due_totals(&lease_charges, today);
                total_unpaid += totals.total_unpaid;
                total_overdue += totals.total_overdue;
                Some(json!({
                    "total_unpaid": totals.total_unpaid,
                    "total_overdue": totals.total_overdue,
                }))
            }
            None => None,
        };

        entries.push(json!({
            "apartment": apartment,
            "lease": lease.as_ref().map(lease_with_tenant_json),
            "summary": summary,
        }));
    }

    let statistics = json!({
        "total_apartments": entries.len(),
        "active_leases": active_leases,
        "total_unpaid": charge_status::round2(total_unpaid),
        "total_overdue": charge_status::round2(total_overdue),
    });

    Ok(Json(json!({
        "data": { "apartments": entries, "statistics": statistics }
    })))
}

async fn tenant_dashboard(state: &AppState, user: &User) -> AppResult<Json<Value>> {
    let pool = state.db()?;

    // A tenant with no lease yet gets an empty dashboard, not an error.
    let Some(lease) = leases::find_active_by_tenant(pool, user.id).await? else {
        return Ok(Json(json!({
            "data": {
                "apartment": null,
                "lease": null,
                "financial_summary": empty_financial_summary(),
            }
        })));
    };

    let apartment = apartments::find_by_id(pool, lease.apartment_id)
        .await?
        .ok_or_else(crate::routes::apartments::apartment_not_found)?;
    let owner = users::find_by_id(pool, apartment.owner_id)
        .await?
        .ok_or_else(crate::routes::apartments::apartment_not_found)?;

    let today = Utc::now().date_naive();
    let lease_charges = charges::list_with_totals(pool, lease.id).await?;
    let totals = charge_status::due_totals(&lease_charges, today);
    let upcoming: Vec<Value> = charge_status::upcoming(&lease_charges, today, 5)
        .into_iter()
        .map(|(entry, derived)| charge_json(&entry, derived, None))
        .collect();

    Ok(Json(json!({
        "data": {
            "apartment": apartment,
            "owner": { "id": owner.id, "full_name": owner.full_name, "email": owner.email },
            "lease": lease,
            "financial_summary": {
                "total_due": totals.total_unpaid,
                "total_overdue": totals.total_overdue,
                "upcoming_charges": upcoming,
            },
        }
    })))
}

/// Summary shape for a tenant with no lease yet. Same keys as the live
/// summary so clients never branch on a missing object.
fn empty_financial_summary() -> Value {
    json!({
        "total_due": 0.0,
        "total_overdue": 0.0,
        "upcoming_charges": [],
    })
}

#[cfg(test)]
mod tests {
    use super::empty_financial_summary;

    #[test]
    fn leaseless_summary_keeps_the_live_summary_shape() {
        let summary = empty_financial_summary();
        assert_eq!(summary["total_due"], 0.0);
        assert_eq!(summary["total_overdue"], 0.0);
        assert!(summary["upcoming_charges"].as_array().unwrap().is_empty());
    }
}
