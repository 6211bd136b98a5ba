/// E-book library
///
/// Listing and metadata for any session; downloads for paid-up members;
/// writes and uploads for admins.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{file_stem, require_paid_up},
};
use associa_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    models::ebook::{Ebook, EbookInput},
    storage,
};
use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EbookRequest {
    #[validate(length(min = 1, max = 255, message = "Informe o título"))]
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[validate(url(message = "URL inválida"))]
    pub cover_url: Option<String>,
}

impl From<EbookRequest> for EbookInput {
    fn from(req: EbookRequest) -> Self {
        EbookInput {
            title: req.title,
            author: req.author,
            description: req.description,
            category: req.category,
            cover_url: req.cover_url,
        }
    }
}

async fn find(state: &AppState, id: Uuid) -> ApiResult<Ebook> {
    Ebook::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("E-book não encontrado".to_string()))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Ebook>>> {
    let ebooks = Ebook::list(&state.db, query.category.as_deref()).await?;
    Ok(Json(ebooks))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Ebook>> {
    Ok(Json(find(&state, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<EbookRequest>,
) -> ApiResult<(StatusCode, Json<Ebook>)> {
    require_admin(&auth)?;
    req.validate()?;

    let ebook = Ebook::create(&state.db, req.into()).await?;
    tracing::info!(ebook_id = %ebook.id, "ebook created");
    Ok((StatusCode::CREATED, Json(ebook)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<EbookRequest>,
) -> ApiResult<Json<Ebook>> {
    require_admin(&auth)?;
    req.validate()?;

    Ebook::update(&state.db, id, req.into())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("E-book não encontrado".to_string()))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    if !Ebook::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("E-book não encontrado".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Stores the document of an e-book from the raw request body
pub async fn upload(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<Ebook>> {
    require_admin(&auth)?;

    if body.is_empty() {
        return Err(ApiError::BadRequest("Arquivo vazio".to_string()));
    }

    let previous = find(&state, id).await?.file_ref;

    let key = format!("ebooks/{}/{}.pdf", id, Uuid::new_v4());
    let size = body.len();
    state.artifacts.put(&key, body).await?;

    let ebook = match Ebook::set_file_ref(&state.db, id, &key).await {
        Ok(Some(ebook)) => ebook,
        Ok(None) => {
            storage::discard(state.artifacts.as_ref(), &key).await;
            return Err(ApiError::NotFound("E-book não encontrado".to_string()));
        }
        Err(e) => {
            storage::discard(state.artifacts.as_ref(), &key).await;
            return Err(e.into());
        }
    };

    if let Some(previous) = previous {
        storage::discard(state.artifacts.as_ref(), &previous).await;
    }

    tracing::info!(ebook_id = %id, size, "ebook file stored");
    Ok(Json(ebook))
}

/// Streams the e-book document
pub async fn download(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    require_paid_up(&state, &auth).await?;

    let ebook = find(&state, id).await?;
    let file_ref = ebook
        .file_ref
        .as_deref()
        .ok_or_else(|| ApiError::NotFound("Arquivo não disponível".to_string()))?;

    let reader = state.artifacts.open(file_ref).await?;
    let disposition = format!("attachment; filename=\"{}.pdf\"", file_stem(&ebook.title));

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response())
}
