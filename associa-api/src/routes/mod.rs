/// API route handlers, one module per resource
///
/// - `health`: liveness and store connectivity
/// - `auth`: registration, login, logout, current member
/// - `payments`: standing, checkout links, processor webhook, ledger admin
/// - `ebooks`, `events`, `benefits`: catalogs
/// - `users`: member administration and cancellation
/// - `certificates`, `credentials`: issuance, downloads, public validation
/// - `views`: access gate for client pages

pub mod auth;
pub mod benefits;
pub mod certificates;
pub mod credentials;
pub mod ebooks;
pub mod events;
pub mod health;
pub mod payments;
pub mod users;
pub mod views;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use associa_shared::{auth::middleware::AuthContext, membership::status::Standing};
use chrono::Utc;
use serde::Deserialize;

/// Member benefits (downloads, event seats) need a paid-up subscription;
/// staff pass without one
pub async fn require_paid_up(state: &AppState, auth: &AuthContext) -> ApiResult<()> {
    if auth.is_admin() {
        return Ok(());
    }

    let standing = state.membership.resolve_status(auth.member_id, Utc::now()).await?;
    match standing.status {
        Standing::Adimplente => Ok(()),
        Standing::Inadimplente | Standing::Cancelado => Err(ApiError::Forbidden(
            "Assinatura inativa: renove para acessar este recurso".to_string(),
        )),
    }
}

/// `Content-Disposition` file name: ASCII letters, digits and dashes
pub fn file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let stem = stem
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if stem.is_empty() {
        "arquivo".to_string()
    } else {
        stem
    }
}

/// `?limit=&offset=` on list endpoints
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl Pagination {
    /// Limit clamped to 1..=200, offset to non-negative
    pub fn clamped(self) -> (i64, i64) {
        (self.limit.clamp(1, 200), self.offset.max(0))
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamped() {
        let page = Pagination {
            limit: 10_000,
            offset: -5,
        };
        assert_eq!(page.clamped(), (200, 0));
        assert_eq!(Pagination::default().clamped(), (50, 0));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Introdução à Psicanálise"), "introdu-o-psican-lise");
        assert_eq!(file_stem("  Vol. 2  "), "vol-2");
        assert_eq!(file_stem("çã"), "arquivo");
    }
}
