/// Events, registrations and attendance certificates
///
/// # Endpoints
///
/// - `GET/POST /api/events`, `GET/PUT/DELETE /api/events/:id`
/// - `POST/DELETE /api/events/:id/register` - own registration
/// - `GET /api/events/:id/registrations` - admin
/// - `PUT /api/events/:id/attendance` - admin, `{ userId, attended }`
/// - `POST /api/events/:id/certificate` - attendance certificate of the caller

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::require_paid_up,
};
use associa_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    models::{
        certificate::Certificate,
        event::{Event, EventInput, EventRegistration},
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_schedule"))]
pub struct EventRequest {
    #[validate(length(min = 1, max = 255, message = "Informe o título"))]
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, message = "Capacidade inválida"))]
    pub capacity: Option<i32>,
    #[validate(range(min = 1, max = 1000, message = "Carga horária inválida"))]
    pub workload_hours: Option<i32>,
}

fn validate_schedule(req: &EventRequest) -> Result<(), ValidationError> {
    match req.ends_at {
        Some(ends_at) if ends_at < req.starts_at => {
            let mut error = ValidationError::new("schedule");
            error.message = Some("O término deve ser posterior ao início".into());
            Err(error)
        }
        _ => Ok(()),
    }
}

impl From<EventRequest> for EventInput {
    fn from(req: EventRequest) -> Self {
        EventInput {
            title: req.title,
            description: req.description,
            location: req.location,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            capacity: req.capacity,
            workload_hours: req.workload_hours,
        }
    }
}

/// Event with its current seat usage
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub registrations: i64,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Evento não encontrado".to_string())
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Event>>> {
    Ok(Json(Event::list(&state.db).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<EventDetail>> {
    let event = state.events.find_event(id).await?.ok_or_else(not_found)?;
    let registrations = state.events.registration_count(id).await?;

    Ok(Json(EventDetail {
        event,
        registrations,
    }))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<EventRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    require_admin(&auth)?;
    req.validate()?;

    let event = Event::create(&state.db, req.into()).await?;
    tracing::info!(event_id = %event.id, "event created");
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<EventRequest>,
) -> ApiResult<Json<Event>> {
    require_admin(&auth)?;
    req.validate()?;

    Event::update(&state.db, id, req.into())
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

    if !Event::delete(&state.db, id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Takes a seat
///
/// # Errors
///
/// - `403 Forbidden`: subscription not paid up
/// - `409 Conflict`: already registered, or no seats left
pub async fn register(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<EventRegistration>)> {
    require_paid_up(&state, &auth).await?;

    let registration = state.membership.register_for_event(auth.member_id, id).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

pub async fn unregister(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.membership.unregister_from_event(auth.member_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn registrations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<EventRegistration>>> {
    require_admin(&auth)?;
    Ok(Json(state.membership.registrations(id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRequest {
    pub user_id: Uuid,
    pub attended: bool,
}

pub async fn attendance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<AttendanceRequest>,
) -> ApiResult<Json<EventRegistration>> {
    require_admin(&auth)?;

    let registration = state
        .membership
        .set_attendance(id, req.user_id, req.attended)
        .await?;
    Ok(Json(registration))
}

/// Issues the caller's attendance certificate
///
/// # Errors
///
/// - `404 Not Found`: no registration for this event
/// - `422 Unprocessable Entity`: attendance not confirmed
/// - `409 Conflict`: certificate already issued
pub async fn certificate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Certificate>)> {
    let certificate = state
        .membership
        .issue_event_certificate(auth.member_id, id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(certificate)))
}
