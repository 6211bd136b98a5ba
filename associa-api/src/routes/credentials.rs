/// Digital credentials
///
/// - `GET /api/credentials/me` - caller's latest credential, `404` before the first payment
/// - `GET /api/validate/:credentialId` - public check by number or QR code,
///   always `200 { isValid, member?, message? }`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use associa_shared::{
    auth::middleware::AuthContext, membership::credential::CredentialValidation,
    models::credential::Credential,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Credential>> {
    state
        .membership
        .current_credential(auth.member_id, Utc::now())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Credencial ainda não emitida".to_string()))
}

/// Public validation
///
/// Unknown values are a negative answer, not an error.
pub async fn validate(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
) -> ApiResult<Json<CredentialValidation>> {
    let validation = state
        .membership
        .validate_credential(&credential_id, Utc::now())
        .await?;

    tracing::debug!(is_valid = validation.is_valid, "credential validated");
    Ok(Json(validation))
}
