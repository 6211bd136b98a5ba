/// Payment endpoints
///
/// - `GET /api/payments/status/:userId` - `{ status, expiryDate }` (self or admin)
/// - `POST /api/payments/update-method` - checkout link for a renewal
/// - `POST /api/payments/webhook` - signed processor notification
/// - `GET /api/payments?userId=` - ledger (members see their own rows)
/// - `POST /api/payments` - manual entry (admin)
/// - `PUT /api/payments/:id/status` - status transition (admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    payments::webhook::{WebhookError, WebhookVerifier, SIGNATURE_HEADER},
    routes::Pagination,
};
use associa_shared::{
    auth::{
        authorization::{require_admin, require_self_or_admin},
        middleware::AuthContext,
    },
    membership::status::SubscriptionStanding,
    models::payment::{CreatePayment, Payment, PaymentPlan, PaymentStatus},
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Current standing of a member
pub async fn status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<SubscriptionStanding>> {
    require_self_or_admin(&auth, user_id)?;

    let standing = state.membership.resolve_status(user_id, Utc::now()).await?;
    Ok(Json(standing))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMethodRequest {
    pub user_id: Uuid,
    pub plan: PaymentPlan,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkResponse {
    pub payment_link: String,
}

/// Creates a checkout link at the payment processor
pub async fn update_method(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateMethodRequest>,
) -> ApiResult<Json<PaymentLinkResponse>> {
    require_self_or_admin(&auth, req.user_id)?;

    let member = state.membership.member(req.user_id).await?;
    let payment_link = state.processor.create_payment_link(&member, req.plan).await?;

    tracing::info!(member_id = %member.id, plan = req.plan.as_str(), "payment link created");
    Ok(Json(PaymentLinkResponse { payment_link }))
}

/// Processor notification
///
/// Verified against `X-Associa-Signature`, then applied by external id so
/// redeliveries are harmless.
///
/// # Errors
///
/// - `401 Unauthorized`: missing or invalid signature, stale timestamp
/// - `400 Bad Request`: body is not a notification
/// - `404 Not Found`: unknown member
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Payment>> {
    let secret = state
        .config
        .payment
        .webhook_secret
        .as_deref()
        .ok_or(WebhookError::NotConfigured)?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Assinatura ausente".to_string()))?;

    let now = Utc::now();
    let payload = WebhookVerifier::new(secret).verify_and_parse(&body, signature, now)?;

    tracing::info!(
        external_id = %payload.id,
        member_id = %payload.member_id,
        status = payload.status.as_str(),
        "payment notification received"
    );

    let payment = state.membership.apply_notification(payload.into(), now).await?;
    Ok(Json(payment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    fn page(&self) -> Pagination {
        let default = Pagination::default();
        Pagination {
            limit: self.limit.unwrap_or(default.limit),
            offset: self.offset.unwrap_or(default.offset),
        }
    }
}

/// Payment history
///
/// Admins see every row (or one member's with `userId`); members only their own.
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Payment>>> {
    let payments = match (auth.is_admin(), query.user_id) {
        (true, None) => {
            let (limit, offset) = query.page().clamped();
            state.payments.list(limit, offset).await?
        }
        (_, Some(user_id)) => {
            require_self_or_admin(&auth, user_id)?;
            state.payments.list_for_member(user_id).await?
        }
        (false, None) => state.payments.list_for_member(auth.member_id).await?,
    };

    Ok(Json(payments))
}

/// Manual ledger entry
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub user_id: Uuid,

    #[validate(range(min = 0, message = "Valor inválido"))]
    pub amount_cents: i64,

    pub plan: PaymentPlan,

    #[serde(default = "default_status")]
    pub status: PaymentStatus,

    #[validate(length(min = 1, max = 50, message = "Informe a forma de pagamento"))]
    pub method: String,

    pub external_id: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

fn default_status() -> PaymentStatus {
    PaymentStatus::Pending
}

/// Records a payment by hand (cash, transfer); paid rows settle immediately
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    require_admin(&auth)?;
    req.validate()?;

    let now = Utc::now();
    let payment_date = match req.status {
        PaymentStatus::Paid | PaymentStatus::Refunded => Some(req.payment_date.unwrap_or(now)),
        PaymentStatus::Pending | PaymentStatus::Failed => req.payment_date,
    };

    let payment = state
        .membership
        .record_payment(
            CreatePayment {
                member_id: req.user_id,
                amount_cents: req.amount_cents,
                plan: req.plan,
                status: req.status,
                method: req.method,
                external_id: req.external_id,
                payment_date,
                due_date: req.due_date.unwrap_or(now),
            },
            now,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: PaymentStatus,
}

/// Moves a payment along the status table
///
/// # Errors
///
/// - `409 Conflict`: transition not allowed (e.g. refunded → paid)
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Payment>> {
    require_admin(&auth)?;

    let payment = state
        .membership
        .change_payment_status(id, req.status, Utc::now())
        .await?;

    Ok(Json(payment))
}
