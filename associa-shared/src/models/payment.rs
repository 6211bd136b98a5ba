/// Payment model and database operations
///
/// One row per billing attempt. Rows are created by the payment processor
/// webhook or by an admin, and are immutable once paid except for the refund
/// transition.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE payment_plan AS ENUM ('monthly', 'annual');
/// CREATE TYPE payment_status AS ENUM ('paid', 'pending', 'failed', 'refunded');
///
/// CREATE TABLE payments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     member_id UUID NOT NULL REFERENCES members(id) ON DELETE CASCADE,
///     amount_cents BIGINT NOT NULL CHECK (amount_cents >= 0),
///     plan payment_plan NOT NULL,
///     status payment_status NOT NULL DEFAULT 'pending',
///     method VARCHAR(64) NOT NULL,
///     external_id VARCHAR(255) UNIQUE,
///     payment_date TIMESTAMPTZ,
///     due_date TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, member_id, amount_cents, plan, status, method, external_id, \
     payment_date, due_date, created_at, updated_at";

/// Ordering that defines "most recent payment"
const RECENT_FIRST: &str = "ORDER BY COALESCE(payment_date, due_date) DESC, created_at DESC";

/// Billing plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_plan", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentPlan {
    /// Renews every 30 days
    Monthly,

    /// Renews every 365 days
    Annual,
}

impl PaymentPlan {
    /// Coverage granted by one paid payment of this plan
    pub fn period(&self) -> Duration {
        match self {
            PaymentPlan::Monthly => Duration::days(30),
            PaymentPlan::Annual => Duration::days(365),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPlan::Monthly => "monthly",
            PaymentPlan::Annual => "annual",
        }
    }
}

/// Billing attempt status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Returns true if a payment may move from `self` to `target`
    ///
    /// ```text
    /// pending ──► paid ──► refunded
    ///    │  ▲       ▲
    ///    ▼  │       │
    ///   failed ─────┘
    /// ```
    pub fn can_transition_to(&self, target: &PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Pending, Paid) | (Pending, Failed) | (Failed, Pending) | (Failed, Paid) | (Paid, Refunded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// Payment model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub member_id: Uuid,

    /// Amount in cents (BRL)
    pub amount_cents: i64,

    pub plan: PaymentPlan,
    pub status: PaymentStatus,

    /// Payment method reported by the processor (pix, credit_card, boleto, manual...)
    pub method: String,

    /// Processor-side identifier, used for webhook idempotency
    pub external_id: Option<String>,

    /// When the payment cleared (None until paid)
    pub payment_date: Option<DateTime<Utc>>,

    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// End of the coverage bought by this payment, if it is paid
    pub fn coverage_end(&self) -> Option<DateTime<Utc>> {
        match (self.status, self.payment_date) {
            (PaymentStatus::Paid, Some(paid_at)) => Some(paid_at + self.plan.period()),
            _ => None,
        }
    }

    /// Instant used to order payments by recency
    pub fn recency_key(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.payment_date.unwrap_or(self.due_date), self.created_at)
    }
}

/// Input for creating a new payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePayment {
    pub member_id: Uuid,
    pub amount_cents: i64,
    pub plan: PaymentPlan,
    pub status: PaymentStatus,
    pub method: String,
    pub external_id: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub due_date: DateTime<Utc>,
}

impl Payment {
    /// Creates a new payment row
    pub async fn create(pool: &PgPool, data: CreatePayment) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO payments (member_id, amount_cents, plan, status, method, external_id,
                                  payment_date, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PAYMENT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Payment>(&query)
            .bind(data.member_id)
            .bind(data.amount_cents)
            .bind(data.plan)
            .bind(data.status)
            .bind(data.method)
            .bind(data.external_id)
            .bind(data.payment_date)
            .bind(data.due_date)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");

        sqlx::query_as::<_, Payment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a payment by its processor-side identifier
    pub async fn find_by_external_id(
        pool: &PgPool,
        external_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE external_id = $1");

        sqlx::query_as::<_, Payment>(&query)
            .bind(external_id)
            .fetch_optional(pool)
            .await
    }

    /// Most recent payment of a member, by payment date (falling back to due date)
    pub async fn latest_for_member(
        pool: &PgPool,
        member_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE member_id = $1 {RECENT_FIRST} LIMIT 1"
        );

        sqlx::query_as::<_, Payment>(&query)
            .bind(member_id)
            .fetch_optional(pool)
            .await
    }

    /// All payments of a member, most recent first
    pub async fn list_for_member(pool: &PgPool, member_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query =
            format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE member_id = $1 {RECENT_FIRST}");

        sqlx::query_as::<_, Payment>(&query)
            .bind(member_id)
            .fetch_all(pool)
            .await
    }

    /// Paid payments of a member in chronological order
    pub async fn list_paid_for_member(
        pool: &PgPool,
        member_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE member_id = $1 AND status = 'paid' AND payment_date IS NOT NULL
            ORDER BY payment_date ASC
            "#
        );

        sqlx::query_as::<_, Payment>(&query)
            .bind(member_id)
            .fetch_all(pool)
            .await
    }

    /// Lists all payments with pagination, most recent first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query =
            format!("SELECT {PAYMENT_COLUMNS} FROM payments {RECENT_FIRST} LIMIT $1 OFFSET $2");

        sqlx::query_as::<_, Payment>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Changes the status of a payment
    ///
    /// `payment_date` is only overwritten when provided. Transition validity is
    /// checked by the caller against [`PaymentStatus::can_transition_to`].
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: PaymentStatus,
        payment_date: Option<DateTime<Utc>>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE payments
            SET status = $2, payment_date = COALESCE($3, payment_date), updated_at = NOW()
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Payment>(&query)
            .bind(id)
            .bind(status)
            .bind(payment_date)
            .fetch_optional(pool)
            .await
    }
}
