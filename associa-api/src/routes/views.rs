/// Access gate for client pages
///
/// Every member page (`/dashboard`, `/profile`, `/ebooks`, `/events`,
/// `/benefits`, `/certificates`, `/credential`) and the back-office (`/admin`,
/// `/admin/*`) runs the gate before the client shell is served:
///
/// ```text
/// no session            ─► 303 /login
/// member on /admin      ─► 303 /dashboard
/// member not paid up    ─► 303 /payment-required
/// lookup failure        ─► 303 /payment-required
/// authorized            ─► client shell (or a JSON view descriptor)
/// ```
///
/// `GET /api/access/*view` returns the same decision as JSON for clients that
/// route on their own.

use crate::{
    app::{load_session, AppState},
    error::{ApiError, ApiResult},
};
use associa_shared::{
    auth::middleware::{AuthContext, AuthError},
    membership::{
        gate::{self, renewal_actions, Gate, Render, RenewalAction, View, PAYMENT_REQUIRED_PATH},
        status::{Standing, SubscriptionStanding},
    },
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;

/// Session of a page request; a bad or stale token counts as no session
async fn session_for_view(state: &AppState, headers: &HeaderMap) -> ApiResult<Option<AuthContext>> {
    match load_session(state, headers).await {
        Ok(auth) => Ok(Some(auth)),
        Err(AuthError::DatabaseError(msg)) => Err(ApiError::ServiceUnavailable(msg)),
        Err(e) => {
            tracing::debug!(reason = ?e, "no usable session for view");
            Ok(None)
        }
    }
}

async fn run_gate(state: &AppState, headers: &HeaderMap, view: View) -> ApiResult<Gate> {
    let session = session_for_view(state, headers).await?;
    let membership = state.membership.clone();

    let gate = gate::evaluate(view, session, |member_id| async move {
        membership
            .resolve_status(member_id, Utc::now())
            .await
            .map(|standing| standing.status)
    })
    .await;

    tracing::debug!(view = %gate.view().path(), state = ?gate.state(), "access gate settled");
    Ok(gate)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDescriptor {
    pub view: String,
    pub authorized: bool,
}

/// Serves the client shell for an authorized view
async fn shell(state: &AppState, view: &View) -> ApiResult<Response> {
    match &state.config.api.spa_index {
        Some(index) => {
            let html = tokio::fs::read_to_string(index)
                .await
                .map_err(|e| ApiError::InternalError(format!("reading {}: {}", index, e)))?;
            Ok(Html(html).into_response())
        }
        None => Ok(Json(ViewDescriptor {
            view: view.path(),
            authorized: true,
        })
        .into_response()),
    }
}

/// Handler for every gated page
pub async fn page(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> ApiResult<Response> {
    let view = View::parse(uri.path())
        .ok_or_else(|| ApiError::NotFound("Página não encontrada".to_string()))?;

    let gate = run_gate(&state, &headers, view).await?;

    match gate.render() {
        Render::Redirect(location) => Ok(Redirect::to(location).into_response()),
        Render::PaymentRequired { .. } => Ok(Redirect::to(PAYMENT_REQUIRED_PATH).into_response()),
        Render::Content(view) => shell(&state, &view).await,
        Render::Loading => Err(ApiError::InternalError(
            "access gate did not settle".to_string(),
        )),
    }
}

/// Gate decision for client-side routing
#[derive(Debug, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum AccessDecision {
    Authorized {
        view: String,
    },
    Redirect {
        location: &'static str,
    },
    PaymentRequired {
        standing: Option<Standing>,
        actions: Vec<RenewalAction>,
    },
}

pub async fn access(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(view): Path<String>,
) -> ApiResult<Json<AccessDecision>> {
    let view =
        View::parse(&view).ok_or_else(|| ApiError::NotFound("Página não encontrada".to_string()))?;

    let gate = run_gate(&state, &headers, view).await?;

    let decision = match gate.render() {
        Render::Redirect(location) => AccessDecision::Redirect { location },
        Render::PaymentRequired { standing, actions } => {
            AccessDecision::PaymentRequired { standing, actions }
        }
        Render::Content(view) => AccessDecision::Authorized { view: view.path() },
        Render::Loading => {
            return Err(ApiError::InternalError(
                "access gate did not settle".to_string(),
            ))
        }
    };

    Ok(Json(decision))
}

/// Renewal interstitial
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredPage {
    pub message: &'static str,

    /// Standing of the signed-in member, when it could be resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionStanding>,

    pub actions: Vec<RenewalAction>,
}

pub async fn payment_required(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<PaymentRequiredPage>> {
    let subscription = match session_for_view(&state, &headers).await? {
        Some(auth) => match state.membership.resolve_status(auth.member_id, Utc::now()).await {
            Ok(standing) => Some(standing),
            Err(e) => {
                tracing::warn!(member_id = %auth.member_id, error = %e, "standing unavailable");
                None
            }
        },
        None => None,
    };

    Ok(Json(PaymentRequiredPage {
        message: "Sua assinatura não está ativa. Renove para continuar.",
        subscription,
        actions: renewal_actions(),
    }))
}
