/// Certificates
///
/// # Endpoints
///
/// - `GET /api/certificates/eligibility` - caller's streak towards certification
/// - `GET /api/certificates?userId=` - issued certificates (own, or any for admins)
/// - `POST /api/certificates` - `{ type, userId? }`, issues a membership certificate
/// - `GET /api/certificates/:id/download` - streams the stored document

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use associa_shared::{
    auth::{authorization::require_self_or_admin, middleware::AuthContext},
    membership::{certificate::download_name, eligibility::Eligibility},
    models::certificate::{Certificate, CertificateType},
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

pub async fn eligibility(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Eligibility>> {
    let eligibility = state
        .membership
        .compute_eligibility(auth.member_id, Utc::now())
        .await?;
    Ok(Json(eligibility))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub user_id: Option<Uuid>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Certificate>>> {
    let member_id = query.user_id.unwrap_or(auth.member_id);
    require_self_or_admin(&auth, member_id)?;

    Ok(Json(state.certificates.list_for_member(member_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    #[serde(rename = "type")]
    pub certificate_type: CertificateType,
    pub user_id: Option<Uuid>,
}

/// Issues a membership certificate
///
/// # Errors
///
/// - `422 Unprocessable Entity`: fewer than twelve consecutive paid months
/// - `409 Conflict`: an active certificate of this type exists
/// - `400 Bad Request`: event certificates go through the event endpoint
pub async fn issue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<IssueRequest>,
) -> ApiResult<(StatusCode, Json<Certificate>)> {
    let member_id = req.user_id.unwrap_or(auth.member_id);
    require_self_or_admin(&auth, member_id)?;

    let certificate = state
        .membership
        .issue_certificate(member_id, req.certificate_type, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(certificate)))
}

pub async fn download(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let certificate = state
        .certificates
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Certificado não encontrado".to_string()))?;

    require_self_or_admin(&auth, certificate.member_id)?;

    let reader = state.artifacts.open(&certificate.file_ref).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        download_name(certificate.certificate_type, certificate.id)
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response())
}
