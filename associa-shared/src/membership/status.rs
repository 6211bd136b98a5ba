/// Subscription standing
///
/// A member's standing is derived from their latest payment; it is never
/// stored as the source of truth. The `subscription_status` column on the
/// member row is a cache refreshed through [`cached_status`].
///
/// ```text
/// cancelled_at set ─────────────────────────────► cancelado
/// latest payment paid && paid_at + period > now ─► adimplente (expiry = paid_at + period)
/// latest payment paid, lapsed ───────────────────► inadimplente (expiry = lapsed instant)
/// anything else / no payment ────────────────────► inadimplente (expiry = null)
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::member::{Member, SubscriptionStatus};
use crate::models::payment::Payment;

/// Member standing with the association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standing {
    /// Paid up
    Adimplente,

    /// Not paid up (never paid, lapsed, failed, refunded)
    Inadimplente,

    /// Membership cancelled
    Cancelado,
}

impl Standing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Standing::Adimplente => "adimplente",
            Standing::Inadimplente => "inadimplente",
            Standing::Cancelado => "cancelado",
        }
    }

    pub fn is_paid_up(&self) -> bool {
        matches!(self, Standing::Adimplente)
    }
}

/// Resolved standing, serialized as `{ "status": ..., "expiryDate": ... }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStanding {
    pub status: Standing,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Derives the standing of `member` given its most recent payment
pub fn resolve(
    member: &Member,
    latest_payment: Option<&Payment>,
    now: DateTime<Utc>,
) -> SubscriptionStanding {
    let expiry = latest_payment.and_then(Payment::coverage_end);

    if member.is_cancelled() {
        return SubscriptionStanding {
            status: Standing::Cancelado,
            expiry_date: expiry,
        };
    }

    match expiry {
        Some(expiry) if expiry > now => SubscriptionStanding {
            status: Standing::Adimplente,
            expiry_date: Some(expiry),
        },
        _ => SubscriptionStanding {
            status: Standing::Inadimplente,
            expiry_date: expiry,
        },
    }
}

/// Value of the cached `subscription_status` column for a standing
pub fn cached_status(standing: Standing, has_payments: bool) -> SubscriptionStatus {
    match standing {
        Standing::Adimplente => SubscriptionStatus::Active,
        Standing::Cancelado => SubscriptionStatus::Inactive,
        Standing::Inadimplente if has_payments => SubscriptionStatus::Inactive,
        Standing::Inadimplente => SubscriptionStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::MemberRole;
    use crate::models::payment::{PaymentPlan, PaymentStatus};
    use chrono::Duration;
    use uuid::Uuid;

    fn member() -> Member {
        let now = Utc::now();
        Member {
            id: Uuid::new_v4(),
            name: "Beatriz".to_string(),
            email: "beatriz@example.com".to_string(),
            password_hash: String::new(),
            phone: None,
            cpf: "111.222.333-44".to_string(),
            occupation: Some("Psicanalista".to_string()),
            graduated: true,
            role: MemberRole::Member,
            subscription_status: SubscriptionStatus::Pending,
            photo_url: None,
            cancelled_at: None,
            last_login_at: None,
            created_at: now - Duration::days(400),
            updated_at: now,
        }
    }

    fn payment(
        plan: PaymentPlan,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            amount_cents: 4990,
            plan,
            status,
            method: "pix".to_string(),
            external_id: None,
            payment_date: paid_at,
            due_date: paid_at.unwrap_or(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_no_payment_is_inadimplente() {
        let standing = resolve(&member(), None, Utc::now());

        assert_eq!(standing.status, Standing::Inadimplente);
        assert!(standing.expiry_date.is_none());
    }

    #[test]
    fn test_unpaid_latest_is_inadimplente() {
        let now = Utc::now();
        for status in [PaymentStatus::Pending, PaymentStatus::Failed, PaymentStatus::Refunded] {
            let latest = payment(PaymentPlan::Annual, status, Some(now - Duration::days(1)));
            let standing = resolve(&member(), Some(&latest), now);

            assert_eq!(standing.status, Standing::Inadimplente, "{:?}", status);
            assert!(standing.expiry_date.is_none());
        }
    }

    #[test]
    fn test_monthly_within_thirty_days() {
        let now = Utc::now();
        let paid_at = now - Duration::days(29);
        let latest = payment(PaymentPlan::Monthly, PaymentStatus::Paid, Some(paid_at));

        let standing = resolve(&member(), Some(&latest), now);

        assert_eq!(standing.status, Standing::Adimplente);
        assert_eq!(standing.expiry_date, Some(paid_at + Duration::days(30)));
    }

    #[test]
    fn test_monthly_after_thirty_days_lapses() {
        let now = Utc::now();
        let paid_at = now - Duration::days(30);
        let latest = payment(PaymentPlan::Monthly, PaymentStatus::Paid, Some(paid_at));

        let standing = resolve(&member(), Some(&latest), now);

        assert_eq!(standing.status, Standing::Inadimplente);
        assert_eq!(standing.expiry_date, Some(paid_at + Duration::days(30)));
    }

    #[test]
    fn test_annual_paid_today() {
        let now = Utc::now();
        let latest = payment(PaymentPlan::Annual, PaymentStatus::Paid, Some(now));

        let standing = resolve(&member(), Some(&latest), now);

        assert_eq!(standing.status, Standing::Adimplente);
        assert_eq!(standing.expiry_date, Some(now + Duration::days(365)));
    }

    #[test]
    fn test_cancelled_overrides_payment() {
        let now = Utc::now();
        let mut cancelled = member();
        cancelled.cancelled_at = Some(now - Duration::days(1));
        let latest = payment(PaymentPlan::Annual, PaymentStatus::Paid, Some(now - Duration::days(10)));

        let standing = resolve(&cancelled, Some(&latest), now);

        assert_eq!(standing.status, Standing::Cancelado);
    }

    #[test]
    fn test_serialized_shape() {
        let standing = SubscriptionStanding {
            status: Standing::Inadimplente,
            expiry_date: None,
        };
        let json = serde_json::to_value(standing).unwrap();

        assert_eq!(json["status"], "inadimplente");
        assert!(json["expiryDate"].is_null());
    }

    #[test]
    fn test_cached_status_mapping() {
        assert_eq!(cached_status(Standing::Adimplente, true), SubscriptionStatus::Active);
        assert_eq!(cached_status(Standing::Cancelado, true), SubscriptionStatus::Inactive);
        assert_eq!(cached_status(Standing::Inadimplente, true), SubscriptionStatus::Inactive);
        assert_eq!(cached_status(Standing::Inadimplente, false), SubscriptionStatus::Pending);
    }
}
