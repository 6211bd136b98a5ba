/// Session extraction for Axum
///
/// The API server resolves the session token of every request into an
/// [`AuthContext`] and inserts it into the request extensions. This module holds
/// the framework-level pieces: the context type, token extraction from the
/// `Authorization` header or the session cookie, and the `Set-Cookie` values
/// used on login and logout.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use associa_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("member {} ({})", auth.member_id, auth.role.as_str())
/// }
/// ```

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::models::member::{Member, MemberRole};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "associa_session";

/// Authenticated principal of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub member_id: Uuid,

    /// Role as currently stored, not as it was at login
    pub role: MemberRole,
}

impl AuthContext {
    pub fn new(member_id: Uuid, role: MemberRole) -> Self {
        Self { member_id, role }
    }

    pub fn from_member(member: &Member) -> Self {
        Self::new(member.id, member.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Error type for session resolution
#[derive(Debug)]
pub enum AuthError {
    /// No token in the request
    MissingCredentials,

    /// Token present but invalid or expired
    InvalidToken(String),

    /// Token valid but the member no longer exists
    UnknownMember,

    /// Store failure while loading the member
    DatabaseError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::MissingCredentials => {
                (StatusCode::UNAUTHORIZED, "unauthorized", "Não autenticado".to_string())
            }
            AuthError::InvalidToken(_) | AuthError::UnknownMember => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Sessão inválida ou expirada".to_string(),
            ),
            AuthError::DatabaseError(msg) => {
                tracing::error!(error = %msg, "session lookup failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    "Serviço temporariamente indisponível".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

/// Reads the session token from a request
///
/// `Authorization: Bearer <token>` wins over the cookie so API clients can
/// authenticate without a cookie jar.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value carrying a new session
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_auth_context_admin() {
        let member = AuthContext::new(Uuid::new_v4(), MemberRole::Member);
        let admin = AuthContext::new(Uuid::new_v4(), MemberRole::Admin);

        assert!(!member.is_admin());
        assert!(admin.is_admin());
    }

    #[test]
    fn test_extract_token_from_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        headers.insert(header::COOKIE, HeaderValue::from_static("associa_session=cookie-token"));

        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; associa_session=tok123; lang=pt-BR"),
        );

        assert_eq!(extract_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn test_extract_token_missing() {
        let mut headers = HeaderMap::new();
        assert!(extract_token(&headers).is_none());

        headers.insert(header::COOKIE, HeaderValue::from_static("associa_session="));
        assert!(extract_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(extract_token(&headers).is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok", 3600, false);
        assert!(cookie.starts_with("associa_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(!cookie.contains("Secure"));

        assert!(session_cookie("tok", 60, true).ends_with("; Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn test_auth_error_into_response() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::UnknownMember.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::DatabaseError("down".to_string()).into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
