/// Error handling for the API server
///
/// Handlers return `Result<T, ApiError>`; the error renders as
/// `{ "error": <code>, "message": <pt-BR text>, "details": [...] }` with the
/// matching status code. Internal errors are logged and masked.
///
/// # Example
///
/// ```
/// use associa_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler(found: bool) -> ApiResult<Json<serde_json::Value>> {
///     if !found {
///         return Err(ApiError::NotFound("Evento não encontrado".to_string()));
///     }
///     Ok(Json(json!({ "ok": true })))
/// }
/// ```

use associa_shared::auth::{
    authorization::AuthzError, jwt::JwtError, middleware::AuthError, password::PasswordError,
};
use associa_shared::membership::{MembershipError, RepositoryError};
use associa_shared::storage::StorageError;
use crate::payments::{webhook::WebhookError, ProcessorError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. duplicate email
    Conflict(String),

    /// Unprocessable entity (422) with field errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Unprocessable entity (422) for a business rule
    Unprocessable(String),

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code (e.g. "bad_request", "not_eligible")
    pub error: String,

    /// User-facing message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message: message.into(),
        }])
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::Unprocessable(msg) => write!(f, "Unprocessable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Dados inválidos".to_string(),
                Some(errors),
            ),
            ApiError::Unprocessable(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable", msg, None)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Ocorreu um erro interno".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::error!("Service unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    "Serviço temporariamente indisponível".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

fn conflict_message(constraint: &str) -> String {
    if constraint.contains("email") {
        "E-mail já cadastrado".to_string()
    } else if constraint.contains("cpf") {
        "CPF já cadastrado".to_string()
    } else if constraint.contains("registration") {
        "Inscrição já realizada".to_string()
    } else {
        "Registro duplicado".to_string()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Registro não encontrado".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                ApiError::ServiceUnavailable(format!("Database unavailable: {}", err))
            }
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    return ApiError::Conflict(conflict_message(constraint));
                }
                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(constraint) => ApiError::Conflict(conflict_message(&constraint)),
            RepositoryError::Database(e) => e.into(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ApiError::NotFound("Arquivo não encontrado".to_string()),
            StorageError::InvalidKey(key) => {
                ApiError::InternalError(format!("Invalid artifact key: {}", key))
            }
            StorageError::TooLarge { max, .. } => {
                ApiError::BadRequest(format!("Arquivo excede o limite de {} bytes", max))
            }
            StorageError::Io(e) => ApiError::InternalError(format!("Storage error: {}", e)),
        }
    }
}

impl From<MembershipError> for ApiError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::MemberNotFound => {
                ApiError::NotFound("Associado não encontrado".to_string())
            }
            MembershipError::EventNotFound => ApiError::NotFound("Evento não encontrado".to_string()),
            MembershipError::PaymentNotFound => {
                ApiError::NotFound("Pagamento não encontrado".to_string())
            }
            MembershipError::RegistrationNotFound => {
                ApiError::NotFound("Inscrição não encontrada".to_string())
            }
            MembershipError::AlreadyRegistered => {
                ApiError::Conflict("Inscrição já realizada".to_string())
            }
            MembershipError::EventFull => ApiError::Conflict("Evento sem vagas".to_string()),
            MembershipError::NotAttended => {
                ApiError::Unprocessable("Presença no evento não confirmada".to_string())
            }
            MembershipError::NotEligible { months_completed } => ApiError::Unprocessable(format!(
                "Requisito não atingido: {} de 12 meses consecutivos de associação",
                months_completed
            )),
            MembershipError::AlreadyIssued => {
                ApiError::Conflict("Certificado já emitido".to_string())
            }
            MembershipError::EventRequired => ApiError::BadRequest(
                "Certificados de evento são emitidos pela página do evento".to_string(),
            ),
            MembershipError::InvalidTransition { from, to } => ApiError::Conflict(format!(
                "Transição de pagamento inválida: {} → {}",
                from.as_str(),
                to.as_str()
            )),
            MembershipError::Credential(msg) => {
                ApiError::InternalError(format!("Credential error: {}", msg))
            }
            MembershipError::Repository(e) => e.into(),
            MembershipError::Storage(e) => e.into(),
        }
    }
}

/// Convert session errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Não autenticado".to_string()),
            AuthError::InvalidToken(_) | AuthError::UnknownMember => {
                ApiError::Unauthorized("Sessão inválida ou expirada".to_string())
            }
            AuthError::DatabaseError(msg) => ApiError::ServiceUnavailable(msg),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::AdminRequired => {
                ApiError::Forbidden("Acesso restrito a administradores".to_string())
            }
            AuthzError::NotAuthorized => {
                ApiError::Forbidden("Sem permissão para acessar este recurso".to_string())
            }
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => {
                ApiError::InternalError(format!("Token creation failed: {}", msg))
            }
            _ => ApiError::Unauthorized("Sessão inválida ou expirada".to_string()),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::ParseError(msg) => {
                ApiError::BadRequest(format!("Notificação inválida: {}", msg))
            }
            WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp => {
                ApiError::Unauthorized("Assinatura inválida".to_string())
            }
            WebhookError::NotConfigured => {
                ApiError::ServiceUnavailable("Webhook secret not configured".to_string())
            }
        }
    }
}

impl From<ProcessorError> for ApiError {
    fn from(err: ProcessorError) -> Self {
        ApiError::ServiceUnavailable(format!("Payment processor: {}", err))
    }
}

/// Convert `validator` errors into field details
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Valor inválido".to_string()),
                })
            })
            .collect();

        ApiError::ValidationError(details)
    }
}
