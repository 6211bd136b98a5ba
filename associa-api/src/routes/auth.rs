/// Authentication endpoints
///
/// Sessions are HS256 tokens carried in the `associa_session` cookie
/// (HttpOnly, SameSite=Lax). API clients may send the same token as
/// `Authorization: Bearer`.
///
/// # Endpoints
///
/// - `POST /api/register` - Create a member account, `201` + session cookie
/// - `POST /api/login` - Start a session
/// - `POST /api/logout` - Clear the session cookie, `204`
/// - `GET /api/user` - Current member

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use associa_shared::{
    auth::{
        jwt,
        middleware::{clear_session_cookie, session_cookie, AuthContext},
        password,
    },
    models::member::{normalize_cpf, CreateMember, Member, MemberRole},
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use serde::Deserialize;
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 255, message = "Informe o nome completo"))]
    pub name: String,

    #[validate(email(message = "E-mail inválido"))]
    pub email: String,

    #[validate(length(min = 8, message = "A senha deve ter pelo menos 8 caracteres"))]
    pub password: String,

    #[validate(length(max = 32, message = "Telefone inválido"))]
    pub phone: Option<String>,

    pub cpf: String,

    #[validate(length(max = 255, message = "Profissão muito longa"))]
    pub occupation: Option<String>,

    #[serde(default)]
    pub graduated: bool,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "E-mail inválido"))]
    pub email: String,

    pub password: String,
}

/// Issues a session token and wraps `body` with its cookie
fn with_session(
    state: &AppState,
    member: &Member,
    status: StatusCode,
) -> ApiResult<impl IntoResponse> {
    let ttl = state.config.session.ttl();
    let token = jwt::create_token(&jwt::Claims::new(member.id, ttl), state.jwt_secret())?;
    let cookie = session_cookie(&token, ttl.num_seconds(), state.secure_cookies());

    Ok((
        status,
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(member.clone()),
    ))
}

/// Registers a new member
///
/// The account starts with the `member` role and `pending` subscription
/// status; the member is not paid up until the first payment settles.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: invalid fields, weak password or CPF
/// - `409 Conflict`: e-mail or CPF already registered
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    password::validate_password_strength(&req.password)
        .map_err(|e| ApiError::field("password", e))?;

    let cpf = normalize_cpf(&req.cpf).ok_or_else(|| ApiError::field("cpf", "CPF inválido"))?;

    let password_hash = password::hash_password(&req.password)?;

    let member = state
        .members
        .create(CreateMember {
            name: req.name.trim().to_string(),
            email: req.email.trim().to_lowercase(),
            password_hash,
            phone: req.phone,
            cpf,
            occupation: req.occupation,
            graduated: req.graduated,
            role: MemberRole::Member,
        })
        .await?;

    tracing::info!(member_id = %member.id, "member registered");

    with_session(&state, &member, StatusCode::CREATED)
}

/// Starts a session
///
/// # Errors
///
/// - `401 Unauthorized`: unknown e-mail or wrong password (same message)
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("E-mail ou senha inválidos".to_string());

    let member = state
        .members
        .find_by_email(req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &member.password_hash)? {
        tracing::debug!(member_id = %member.id, "login rejected");
        return Err(invalid());
    }

    if let Err(e) = state.members.touch_last_login(member.id).await {
        tracing::warn!(member_id = %member.id, error = %e, "failed to record last login");
    }

    with_session(&state, &member, StatusCode::OK)
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie(state.secure_cookies()))]),
    )
}

/// Current member
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Member>> {
    let member = state
        .members
        .find_by_id(auth.member_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Sessão inválida ou expirada".to_string()))?;

    Ok(Json(member))
}
