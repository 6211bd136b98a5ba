/// Partner benefits directory
///
/// Members see active benefits only; admins see and manage all of them.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use associa_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    models::benefit::{Benefit, BenefitInput},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BenefitRequest {
    #[validate(length(min = 1, max = 255, message = "Informe o parceiro"))]
    pub partner_name: String,
    pub description: Option<String>,
    #[validate(length(max = 100, message = "Desconto muito longo"))]
    pub discount: Option<String>,
    pub category: Option<String>,
    #[validate(url(message = "URL inválida"))]
    pub link: Option<String>,
    #[validate(url(message = "URL inválida"))]
    pub logo_url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl From<BenefitRequest> for BenefitInput {
    fn from(req: BenefitRequest) -> Self {
        BenefitInput {
            partner_name: req.partner_name,
            description: req.description,
            discount: req.discount,
            category: req.category,
            link: req.link,
            logo_url: req.logo_url,
            active: req.active,
        }
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Benefício não encontrado".to_string())
}

pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Benefit>>> {
    Ok(Json(Benefit::list(&state.db, auth.is_admin()).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Benefit>> {
    let benefit = Benefit::find_by_id(&state.db, id)
        .await?
        .filter(|b| b.active || auth.is_admin())
        .ok_or_else(not_found)?;

    Ok(Json(benefit))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<BenefitRequest>,
) -> ApiResult<(StatusCode, Json<Benefit>)> {
    require_admin(&auth)?;
    req.validate()?;

    let benefit = Benefit::create(&state.db, req.into()).await?;
    tracing::info!(benefit_id = %benefit.id, "benefit created");
    Ok((StatusCode::CREATED, Json(benefit)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<BenefitRequest>,
) -> ApiResult<Json<Benefit>> {
    require_admin(&auth)?;
    req.validate()?;

    Benefit::update(&state.db, id, req.into())
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    if !Benefit::delete(&state.db, id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
