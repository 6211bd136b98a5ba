/// Member administration
///
/// # Endpoints
///
/// - `GET /api/users` - admin, paginated
/// - `GET /api/users/:id` - self or admin
/// - `PUT /api/users/:id` - self (profile fields) or admin (all fields)
/// - `DELETE /api/users/:id` - admin
/// - `POST /api/users/:id/cancel` - self or admin, ends the membership
/// - `GET /api/users/:id/eligibility` - admin

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::Pagination,
};
use associa_shared::{
    auth::{
        authorization::{require_admin, require_self_or_admin},
        middleware::AuthContext,
        password,
    },
    membership::{eligibility::Eligibility, status::SubscriptionStanding},
    models::member::{normalize_cpf, Member, MemberRole, UpdateMember},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct MemberPage {
    pub users: Vec<Member>,
    pub total: i64,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<MemberPage>> {
    require_admin(&auth)?;

    let (limit, offset) = page.clamped();
    let users = state.members.list(limit, offset).await?;
    let total = state.members.count().await?;

    Ok(Json(MemberPage { users, total }))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Member>> {
    require_self_or_admin(&auth, id)?;
    Ok(Json(state.membership.member(id).await?))
}

/// Profile update
///
/// Empty strings clear optional fields. `email`, `cpf` and `role` are
/// reserved to admins; members changing their password must send
/// `currentPassword`.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 255, message = "Informe o nome completo"))]
    pub name: Option<String>,
    #[validate(length(max = 32, message = "Telefone inválido"))]
    pub phone: Option<String>,
    #[validate(length(max = 255, message = "Profissão muito longa"))]
    pub occupation: Option<String>,
    pub graduated: Option<bool>,
    pub photo_url: Option<String>,

    pub password: Option<String>,
    pub current_password: Option<String>,

    #[validate(email(message = "E-mail inválido"))]
    pub email: Option<String>,
    pub cpf: Option<String>,
    pub role: Option<MemberRole>,
}

impl UpdateUserRequest {
    fn touches_admin_fields(&self) -> bool {
        self.email.is_some() || self.cpf.is_some() || self.role.is_some()
    }
}

fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| {
        let v = v.trim().to_string();
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    })
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<Member>> {
    require_self_or_admin(&auth, id)?;
    req.validate()?;

    if !auth.is_admin() && req.touches_admin_fields() {
        return Err(ApiError::Forbidden(
            "Somente administradores podem alterar e-mail, CPF ou perfil".to_string(),
        ));
    }

    let current = state.membership.member(id).await?;

    let password_hash = match &req.password {
        None => None,
        Some(new_password) => {
            if !auth.is_admin() {
                let current_password = req.current_password.as_deref().unwrap_or_default();
                if !password::verify_password(current_password, &current.password_hash)? {
                    return Err(ApiError::field("currentPassword", "Senha atual incorreta"));
                }
            }
            password::validate_password_strength(new_password)
                .map_err(|e| ApiError::field("password", e))?;
            Some(password::hash_password(new_password)?)
        }
    };

    let cpf = match &req.cpf {
        Some(raw) => {
            Some(normalize_cpf(raw).ok_or_else(|| ApiError::field("cpf", "CPF inválido"))?)
        }
        None => None,
    };

    let update = UpdateMember {
        name: req.name.map(|n| n.trim().to_string()),
        email: req.email.map(|e| e.trim().to_lowercase()),
        password_hash,
        phone: clearable(req.phone),
        cpf,
        occupation: clearable(req.occupation),
        graduated: req.graduated,
        role: req.role,
        photo_url: clearable(req.photo_url),
    };

    let member = state
        .members
        .update(id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Associado não encontrado".to_string()))?;

    tracing::info!(member_id = %id, by = %auth.member_id, "member updated");
    Ok(Json(member))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    if id == auth.member_id {
        return Err(ApiError::BadRequest(
            "Não é possível excluir a própria conta".to_string(),
        ));
    }

    if !state.members.delete(id).await? {
        return Err(ApiError::NotFound("Associado não encontrado".to_string()));
    }

    tracing::info!(member_id = %id, by = %auth.member_id, "member deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Cancels the membership; standing becomes `cancelado` until a new payment
pub async fn cancel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SubscriptionStanding>> {
    require_self_or_admin(&auth, id)?;

    let standing = state.membership.cancel_membership(id, Utc::now()).await?;
    Ok(Json(standing))
}

pub async fn eligibility(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Eligibility>> {
    require_admin(&auth)?;
    Ok(Json(state.membership.compute_eligibility(id, Utc::now()).await?))
}
