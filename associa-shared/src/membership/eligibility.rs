/// Continuous-membership eligibility
///
/// Each paid payment covers `[payment_date, payment_date + plan period)`, the
/// same interval the standing resolver uses. Overlapping or touching
/// intervals merge into coverage runs; any uncovered instant between two
/// payments splits them.
///
/// The streak is the number of whole calendar months elapsed from the start
/// of the latest run up to `now`, or up to the end of that run if it has
/// lapsed. A lapse therefore keeps the months already earned until the next
/// payment starts a new run from zero.
///
/// Certificates require a streak of [`REQUIRED_MONTHS`].

use chrono::{DateTime, Months, Utc};
use serde::Serialize;

use crate::models::payment::Payment;

pub const REQUIRED_MONTHS: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub progress_percent: u32,
    pub months_completed: u32,
    pub eligible: bool,
}

impl Eligibility {
    pub fn from_months(months_completed: u32) -> Self {
        Self {
            progress_percent: (months_completed * 100 / REQUIRED_MONTHS).min(100),
            months_completed,
            eligible: months_completed >= REQUIRED_MONTHS,
        }
    }
}

/// Continuous covered interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CoverageRun {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Merges the coverage of paid payments dated in `[enrollment_start, now]`
fn coverage_runs(
    enrollment_start: DateTime<Utc>,
    payments: &[Payment],
    now: DateTime<Utc>,
) -> Vec<CoverageRun> {
    let mut intervals: Vec<CoverageRun> = payments
        .iter()
        .filter_map(|p| {
            let start = p.payment_date?;
            let end = p.coverage_end()?;
            (start >= enrollment_start && start <= now).then_some(CoverageRun { start, end })
        })
        .collect();
    intervals.sort_by_key(|run| run.start);

    let mut runs: Vec<CoverageRun> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match runs.last_mut() {
            Some(last) if interval.start <= last.end => last.end = last.end.max(interval.end),
            _ => runs.push(interval),
        }
    }
    runs
}

/// Whole calendar months from `from` to `to`; month-end dates clamp
fn whole_months(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    let mut n = 0;
    while let Some(next) = from.checked_add_months(Months::new(n + 1)) {
        if next > to {
            break;
        }
        n += 1;
    }
    n
}

/// Computes the streak from the member's payments
///
/// Payments that are not paid, or are dated before enrollment, are ignored.
pub fn compute(enrollment_start: DateTime<Utc>, payments: &[Payment], now: DateTime<Utc>) -> Eligibility {
    let Some(latest) = coverage_runs(enrollment_start, payments, now).pop() else {
        return Eligibility::from_months(0);
    };

    Eligibility::from_months(whole_months(latest.start, latest.end.min(now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::status::{resolve, Standing};
    use crate::models::member::{Member, MemberRole, SubscriptionStatus};
    use crate::models::payment::{PaymentPlan, PaymentStatus};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn paid(plan: PaymentPlan, paid_at: DateTime<Utc>) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            member_id: Uuid::nil(),
            amount_cents: 5000,
            plan,
            status: PaymentStatus::Paid,
            method: "pix".to_string(),
            external_id: None,
            payment_date: Some(paid_at),
            due_date: paid_at,
            created_at: paid_at,
            updated_at: paid_at,
        }
    }

    /// Monthly payments every `every`, starting at `first`, while on or before `until`
    fn renewals(first: DateTime<Utc>, every: Duration, until: DateTime<Utc>) -> Vec<Payment> {
        let mut payments = Vec::new();
        let mut paid_at = first;
        while paid_at <= until {
            payments.push(paid(PaymentPlan::Monthly, paid_at));
            paid_at += every;
        }
        payments
    }

    fn member_since(created_at: DateTime<Utc>) -> Member {
        Member {
            id: Uuid::nil(),
            name: "Beatriz".to_string(),
            email: "beatriz@example.com".to_string(),
            password_hash: String::new(),
            phone: None,
            cpf: "111.222.333-44".to_string(),
            occupation: None,
            graduated: true,
            role: MemberRole::Member,
            subscription_status: SubscriptionStatus::Pending,
            photo_url: None,
            cancelled_at: None,
            last_login_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_from_months() {
        assert_eq!(Eligibility::from_months(0).progress_percent, 0);
        assert_eq!(Eligibility::from_months(6).progress_percent, 50);
        assert_eq!(Eligibility::from_months(11).progress_percent, 91);
        assert!(!Eligibility::from_months(11).eligible);

        let full = Eligibility::from_months(12);
        assert_eq!(full.progress_percent, 100);
        assert!(full.eligible);

        assert_eq!(Eligibility::from_months(20).progress_percent, 100);
    }

    #[test]
    fn test_new_member_has_no_progress() {
        let start = at(2026, 1, 10);
        let result = compute(start, &[paid(PaymentPlan::Monthly, start)], at(2026, 2, 1));

        assert_eq!(result, Eligibility::from_months(0));
        assert_eq!(compute(start, &[], at(2027, 1, 1)), Eligibility::from_months(0));
    }

    #[test]
    fn test_renewing_an_hour_early_stays_eligible() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        let every = Duration::days(30) - Duration::hours(1);
        let payments = renewals(start, every, end);
        let member = member_since(start);

        let mut instant = start;
        while instant <= end {
            let latest = payments.iter().filter(|p| p.payment_date <= Some(instant)).last();
            assert_eq!(
                resolve(&member, latest, instant).status,
                Standing::Adimplente,
                "lapsed at {}",
                instant
            );
            instant += Duration::hours(1);
        }

        let result = compute(start, &payments, end);
        assert_eq!(result.months_completed, 12);
        assert!(result.eligible);
    }

    #[test]
    fn test_renewing_an_hour_late_never_accumulates() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        let every = Duration::days(30) + Duration::hours(1);
        let payments = renewals(start, every, end);
        let member = member_since(start);

        // The hour between two coverages is unpaid
        let first_lapse = start + Duration::days(30) + Duration::minutes(30);
        assert_eq!(
            resolve(&member, payments.first(), first_lapse).status,
            Standing::Inadimplente
        );

        assert_eq!(compute(start, &payments, end).months_completed, 0);
    }

    #[test]
    fn test_incomplete_year_does_not_count() {
        let start = at(2025, 1, 10);
        let payments = renewals(start, Duration::days(29), at(2026, 1, 10));

        let result = compute(start, &payments, at(2025, 12, 20));

        assert_eq!(result.months_completed, 11);
        assert!(!result.eligible);
    }

    #[test]
    fn test_gap_resets_streak_from_next_payment() {
        let start = at(2025, 1, 10);
        let mut payments = renewals(start, Duration::days(29), start + Duration::days(29 * 14));
        // Coverage stops at day 117; the next payment on day 145 (Jun 4) starts over
        payments.remove(4);

        let result = compute(start, &payments, at(2026, 3, 15));

        assert_eq!(result.months_completed, 9);
        assert!(!result.eligible);
    }

    #[test]
    fn test_late_first_payment_counts_from_payment() {
        let start = at(2025, 1, 10);
        let first = at(2025, 3, 1);
        let payments = renewals(first, Duration::days(29), first + Duration::days(29 * 12));

        assert_eq!(compute(start, &payments, at(2026, 2, 20)).months_completed, 11);
        assert!(compute(start, &payments, at(2026, 3, 5)).eligible);
    }

    #[test]
    fn test_lapse_keeps_earned_months_until_next_payment() {
        let start = at(2025, 1, 10);
        let payments = renewals(start, Duration::days(29), start + Duration::days(29 * 11));

        // Last coverage ends on Dec 25 2025
        let result = compute(start, &payments, at(2026, 6, 1));
        assert_eq!(result.months_completed, 11);

        let mut resumed = payments.clone();
        resumed.push(paid(PaymentPlan::Monthly, at(2026, 4, 25)));
        assert_eq!(compute(start, &resumed, at(2026, 6, 1)).months_completed, 1);
    }

    #[test]
    fn test_single_payment_a_year_ago_is_not_eligible() {
        let start = at(2025, 1, 10);
        let payments = vec![paid(PaymentPlan::Monthly, start)];

        let result = compute(start, &payments, at(2026, 1, 15));

        assert_eq!(result.months_completed, 0);
        assert!(!result.eligible);
    }

    #[test]
    fn test_annual_payment_is_eligible_at_expiry() {
        let start = at(2025, 1, 10);
        let payments = vec![paid(PaymentPlan::Annual, at(2025, 1, 12))];

        assert_eq!(compute(start, &payments, at(2026, 1, 11)).months_completed, 11);

        let result = compute(start, &payments, at(2026, 1, 12));
        assert_eq!(result.months_completed, 12);
        assert!(result.eligible);
    }

    #[test]
    fn test_unpaid_and_pre_enrollment_payments_ignored() {
        let start = at(2025, 1, 10);
        let mut payments = renewals(start, Duration::days(29), start + Duration::days(29 * 13));
        payments[6].status = PaymentStatus::Refunded;
        payments.push(paid(PaymentPlan::Annual, at(2024, 12, 1)));

        // The run restarts with the payment on Aug 1
        let result = compute(start, &payments, at(2026, 1, 15));

        assert_eq!(result.months_completed, 5);
    }

    #[test]
    fn test_overlapping_runs_merge() {
        let start = at(2025, 1, 10);
        let runs = coverage_runs(
            start,
            &[
                paid(PaymentPlan::Monthly, at(2025, 2, 20)),
                paid(PaymentPlan::Annual, at(2025, 1, 10)),
                paid(PaymentPlan::Monthly, at(2026, 3, 1)),
            ],
            at(2026, 4, 1),
        );

        assert_eq!(
            runs,
            vec![
                CoverageRun {
                    start: at(2025, 1, 10),
                    end: at(2026, 1, 10),
                },
                CoverageRun {
                    start: at(2026, 3, 1),
                    end: at(2026, 3, 31),
                },
            ]
        );
    }

    #[test]
    fn test_month_end_clamps() {
        let start = at(2025, 1, 31);
        assert_eq!(whole_months(start, at(2025, 2, 27)), 0);
        assert_eq!(whole_months(start, at(2025, 2, 28)), 1);
        assert_eq!(whole_months(start, at(2025, 3, 31)), 2);
        assert_eq!(whole_months(start, at(2025, 1, 1)), 0);
    }
}
