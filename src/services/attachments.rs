//! Attachment lifecycle for charges: validate, store, point, presign.
//!
//! The database row is the source of truth for whether an attachment
//! exists; storage operations around it are sequenced so a failure never
//! leaves a pointer at a missing object (an orphaned object with no
//! pointer is acceptable, the reverse is not).

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{rules, AppError, AppResult};
use crate::repository::charges;
use crate::services::storage::Storage;

pub const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("application/pdf", "pdf"),
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
];

pub fn extension_for(content_type: &str) -> AppResult<&'static str> {
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| content_type.eq_ignore_ascii_case(mime))
        .map(|(_, ext)| *ext)
        .ok_or_else(|| {
            AppError::Rule(
                rules::INVALID_FILE_TYPE,
                "Only PDF, JPEG and PNG attachments are accepted.".to_string(),
            )
        })
}

pub fn validate_size(len: usize) -> AppResult<()> {
    if len > MAX_ATTACHMENT_BYTES {
        return Err(AppError::PayloadTooLarge(
            "Attachment exceeds the 5 MB limit.".to_string(),
        ));
    }
    Ok(())
}

/// One object per charge, keyed under its apartment. Re-uploading replaces
/// the object in place when the extension matches.
pub fn attachment_key(apartment_id: Uuid, charge_id: Uuid, extension: &str) -> String {
    format!("{apartment_id}/{charge_id}.{extension}")
}

/// Stores a new attachment for a charge and repoints the row at it. Any
/// previous attachment is removed first.
pub async fn set_attachment(
    pool: &PgPool,
    storage: &Storage,
    apartment_id: Uuid,
    charge_id: Uuid,
    previous_path: Option<&str>,
    content_type: &str,
    bytes: Vec<u8>,
) -> AppResult<String> {
    let extension = extension_for(content_type)?;
    validate_size(bytes.len())?;

    let key = attachment_key(apartment_id, charge_id, extension);

    if let Some(previous) = previous_path {
        if previous != key {
            storage.delete_object_best_effort(previous).await;
        }
    }

    storage.put_object(&key, content_type, bytes).await?;

    if let Err(error) = charges::set_attachment_path(pool, charge_id, Some(&key)).await {
        // Pointer update failed; do not leave an unreferenced upload behind.
        storage.delete_object_best_effort(&key).await;
        return Err(error);
    }

    Ok(key)
}

/// Removes the attachment; callers pass the current pointer so a charge
/// without one fails fast.
pub async fn remove_attachment(
    pool: &PgPool,
    storage: &Storage,
    charge_id: Uuid,
    current_path: Option<&str>,
) -> AppResult<()> {
    let path = current_path.ok_or_else(|| {
        AppError::Rule(
            rules::NO_ATTACHMENT,
            "This charge has no attachment.".to_string(),
        )
    })?;

    storage.delete_object_best_effort(path).await;
    charges::set_attachment_path(pool, charge_id, None).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_pdf_jpeg_png() {
        assert_eq!(extension_for("application/pdf").unwrap(), "pdf");
        assert_eq!(extension_for("image/jpeg").unwrap(), "jpg");
        assert_eq!(extension_for("IMAGE/PNG").unwrap(), "png");
        assert!(extension_for("image/gif").is_err());
        assert!(extension_for("text/plain").is_err());
    }

    #[test]
    fn enforces_size_limit() {
        assert!(validate_size(MAX_ATTACHMENT_BYTES).is_ok());
        assert!(matches!(
            validate_size(MAX_ATTACHMENT_BYTES + 1),
            Err(AppError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn key_is_apartment_scoped_and_charge_named() {
        let apartment = uuid::Uuid::new_v4();
        let charge = uuid::Uuid::new_v4();
        assert_eq!(
            attachment_key(apartment, charge, "pdf"),
            format!("{apartment}/{charge}.pdf")
        );
    }
}
