//! Receipt scanning endpoint.

use axum::{
    Json,
    extract::{Multipart, State},
};
use engine::{CancelToken, ExtractionProvider, Receipt};

use crate::{ServerError, server::ServerState};

/// Upload cap matching the extraction provider's input constraints.
pub(crate) const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ACCEPTED_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/gif"];

/// `POST /api/scan-receipt`: multipart image upload, field name `receipt`.
///
/// Returns the reconciled receipt, including the warning and unresolved
/// discrepancies when the scan never converged.
pub async fn scan<P>(
    State(state): State<ServerState<P>>,
    mut multipart: Multipart,
) -> Result<Json<Receipt>, ServerError>
where
    P: ExtractionProvider + Send + Sync + 'static,
{
    let mut image: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ServerError::Generic(err.to_string()))?
    {
        if field.name() != Some("receipt") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !ACCEPTED_TYPES.contains(&content_type.as_str()) {
            return Err(ServerError::Generic(
                "Please upload a JPEG, PNG, or GIF image".to_string(),
            ));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|err| ServerError::Generic(err.to_string()))?;
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ServerError::Generic(
                "Please upload an image smaller than 5MB".to_string(),
            ));
        }

        image = Some(bytes.to_vec());
        break;
    }

    let Some(image) = image else {
        return Err(ServerError::Generic("No image file provided".to_string()));
    };

    tracing::info!(bytes = image.len(), "processing receipt image");
    let receipt = state
        .reconciler
        .reconcile(&image, &CancelToken::new())
        .await?;

    Ok(Json(receipt))
}
