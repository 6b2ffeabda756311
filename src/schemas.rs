use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::PaymentStatus;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::Validation(format!("Validation failed: {errors}")))
}

pub const MAX_CHARGE_AMOUNT: f64 = 999_999.99;
pub const MAX_COMMENT_LENGTH: usize = 300;

const CHARGE_TYPES: &[&str] = &["rent", "bill", "other"];

/// Positive amount with at most two decimal places, capped at the store's
/// numeric(10,2) ceiling.
pub fn validate_amount(amount: f64) -> Result<(), AppError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::Validation(
            "Amount must be a positive number.".to_string(),
        ));
    }
    if amount > MAX_CHARGE_AMOUNT {
        return Err(AppError::Validation(format!(
            "Amount must not exceed {MAX_CHARGE_AMOUNT}."
        )));
    }
    let cents = amount * 100.0;
    if (cents - cents.round()).abs() > 1e-6 {
        return Err(AppError::Validation(
            "Amount must have at most two decimal places.".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_charge_type(raw: &str) -> Result<(), AppError> {
    if CHARGE_TYPES.contains(&raw) {
        return Ok(());
    }
    Err(AppError::Validation(format!(
        "Charge type must be one of: {}.",
        CHARGE_TYPES.join(", ")
    )))
}

pub fn validate_comment(comment: &str) -> Result<(), AppError> {
    if comment.len() > MAX_COMMENT_LENGTH {
        return Err(AppError::Validation(format!(
            "Comment must not exceed {MAX_COMMENT_LENGTH} characters."
        )));
    }
    Ok(())
}

/// "YYYY-MM" month filter key.
pub fn validate_month(raw: &str) -> Result<(), AppError> {
    let valid = raw.len() == 7
        && raw.as_bytes()[4] == b'-'
        && NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").is_ok();
    if valid {
        return Ok(());
    }
    Err(AppError::Validation(
        "Month filter must use the YYYY-MM format.".to_string(),
    ))
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateApartmentInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateApartmentInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub address: Option<String>,
}

impl UpdateApartmentInput {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none()
    }
}

fn default_false() -> bool {
    false
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApartmentsQuery {
    #[serde(default = "default_false")]
    pub include_archived: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateChargeInput {
    pub amount: f64,
    pub due_date: NaiveDate,
    #[serde(rename = "type")]
    pub charge_type: String,
    pub comment: Option<String>,
}

impl CreateChargeInput {
    pub fn validate_fields(&self) -> Result<(), AppError> {
        validate_amount(self.amount)?;
        validate_charge_type(&self.charge_type)?;
        if let Some(comment) = &self.comment {
            validate_comment(comment)?;
        }
        Ok(())
    }
}

/// `comment: Some(None)` clears the comment; an absent key leaves it as is.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateChargeInput {
    pub amount: Option<f64>,
    pub due_date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub charge_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub comment: Option<Option<String>>,
}

fn deserialize_double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Some(Option::<String>::deserialize(deserializer)?))
}

impl UpdateChargeInput {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.due_date.is_none()
            && self.charge_type.is_none()
            && self.comment.is_none()
    }

    pub fn validate_fields(&self) -> Result<(), AppError> {
        if self.is_empty() {
            return Err(AppError::Validation(
                "At least one field must be provided.".to_string(),
            ));
        }
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
        }
        if let Some(charge_type) = &self.charge_type {
            validate_charge_type(charge_type)?;
        }
        if let Some(Some(comment)) = &self.comment {
            validate_comment(comment)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargesQuery {
    /// Explicit lease scope, for historical or archived leases. Defaults
    /// to the apartment's current active lease.
    pub lease_id: Option<Uuid>,
    pub month: Option<String>,
    pub status: Option<String>,
    pub overdue: Option<bool>,
}

impl ChargesQuery {
    pub fn parsed_status(&self) -> Result<Option<PaymentStatus>, AppError> {
        self.status.as_deref().map(PaymentStatus::parse).transpose()
    }

    pub fn validate_fields(&self) -> Result<(), AppError> {
        if let Some(month) = &self.month {
            validate_month(month)?;
        }
        self.parsed_status()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentInput {
    pub amount: f64,
    pub payment_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApartmentPath {
    pub apartment_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargePath {
    pub charge_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeasePath {
    pub lease_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenPath {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_bounds_and_precision() {
        assert!(validate_amount(0.01).is_ok());
        assert!(validate_amount(999_999.99).is_ok());
        assert!(validate_amount(0.0).is_err());
        assert!(validate_amount(-5.0).is_err());
        assert!(validate_amount(1_000_000.0).is_err());
        assert!(validate_amount(10.123).is_err());
        assert!(validate_amount(f64::NAN).is_err());
    }

    #[test]
    fn month_filter_format() {
        assert!(validate_month("2026-03").is_ok());
        assert!(validate_month("2026-13").is_err());
        assert!(validate_month("2026-3").is_err());
        assert!(validate_month("march").is_err());
    }

    #[test]
    fn charge_update_requires_at_least_one_field() {
        let input: UpdateChargeInput = serde_json::from_str("{}").unwrap();
        assert!(input.is_empty());
        assert!(input.validate_fields().is_err());
    }

    #[test]
    fn charge_update_distinguishes_absent_from_null_comment() {
        let absent: UpdateChargeInput = serde_json::from_str(r#"{"amount": 10}"#).unwrap();
        assert_eq!(absent.comment, None);

        let cleared: UpdateChargeInput = serde_json::from_str(r#"{"comment": null}"#).unwrap();
        assert_eq!(cleared.comment, Some(None));

        let set: UpdateChargeInput = serde_json::from_str(r#"{"comment": "gas"}"#).unwrap();
        assert_eq!(set.comment, Some(Some("gas".to_string())));
    }
}
