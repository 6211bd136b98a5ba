/// Subscription core service
///
/// Orchestrates the pure rules in [`super::status`], [`super::eligibility`],
/// [`super::credential`] and [`super::certificate`] over the repository ports.
/// Every operation takes `now` explicitly.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::certificate;
use super::credential::{self, CredentialValidation};
use super::eligibility::{self, Eligibility};
use super::error::{MembershipError, MembershipResult};
use super::repository::{
    CertificateRepository, CredentialRepository, EventRepository, MemberRepository,
    PaymentLedger, Repositories, RepositoryError,
};
use super::status::{self, SubscriptionStanding};
use crate::models::certificate::{Certificate, CertificateType, NewCertificate};
use crate::models::credential::{Credential, CredentialStatus, NewCredential};
use crate::models::event::{Event, EventRegistration};
use crate::models::member::Member;
use crate::models::payment::{CreatePayment, Payment, PaymentPlan, PaymentStatus};
use crate::storage::{self, ArtifactStore};

/// Attempts at drawing an unused credential number
const CREDENTIAL_NUMBER_ATTEMPTS: usize = 3;

/// Payment state reported by the processor
#[derive(Debug, Clone)]
pub struct PaymentNotification {
    pub external_id: String,
    pub member_id: Uuid,
    pub plan: PaymentPlan,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    pub method: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct MembershipService {
    members: Arc<dyn MemberRepository>,
    payments: Arc<dyn PaymentLedger>,
    credentials: Arc<dyn CredentialRepository>,
    certificates: Arc<dyn CertificateRepository>,
    events: Arc<dyn EventRepository>,
    artifacts: Arc<dyn ArtifactStore>,
    credential_secret: String,
}

impl MembershipService {
    pub fn new(
        repositories: Repositories,
        artifacts: Arc<dyn ArtifactStore>,
        credential_secret: impl Into<String>,
    ) -> Self {
        Self {
            members: repositories.members,
            payments: repositories.payments,
            credentials: repositories.credentials,
            certificates: repositories.certificates,
            events: repositories.events,
            artifacts,
            credential_secret: credential_secret.into(),
        }
    }

    pub async fn member(&self, member_id: Uuid) -> MembershipResult<Member> {
        self.members
            .find_by_id(member_id)
            .await?
            .ok_or(MembershipError::MemberNotFound)
    }

    /// Derives the member's standing and refreshes the cached column
    pub async fn resolve_status(
        &self,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> MembershipResult<SubscriptionStanding> {
        let member = self.member(member_id).await?;
        let latest = self.payments.latest_for_member(member_id).await?;
        let standing = status::resolve(&member, latest.as_ref(), now);

        let cached = status::cached_status(standing.status, latest.is_some());
        if cached != member.subscription_status {
            tracing::debug!(
                member_id = %member_id,
                from = ?member.subscription_status,
                to = ?cached,
                "refreshing cached subscription status"
            );
            if let Err(e) = self.members.set_subscription_status(member_id, cached).await {
                tracing::warn!(member_id = %member_id, error = %e, "failed to refresh cached status");
            }
        }

        Ok(standing)
    }

    pub async fn compute_eligibility(
        &self,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> MembershipResult<Eligibility> {
        let member = self.member(member_id).await?;
        self.eligibility_of(&member, now).await
    }

    async fn eligibility_of(
        &self,
        member: &Member,
        now: DateTime<Utc>,
    ) -> MembershipResult<Eligibility> {
        let paid = self.payments.paid_for_member(member.id).await?;
        Ok(eligibility::compute(member.created_at, &paid, now))
    }

    /// Issues a membership certificate
    ///
    /// # Errors
    ///
    /// - `EventRequired` for [`CertificateType::Evento`]
    /// - `NotEligible` below twelve consecutive months
    /// - `AlreadyIssued` when an active certificate of the type exists
    pub async fn issue_certificate(
        &self,
        member_id: Uuid,
        certificate_type: CertificateType,
        now: DateTime<Utc>,
    ) -> MembershipResult<Certificate> {
        if !certificate_type.requires_membership_streak() {
            return Err(MembershipError::EventRequired);
        }

        let member = self.member(member_id).await?;
        let eligibility = self.eligibility_of(&member, now).await?;
        if !eligibility.eligible {
            return Err(MembershipError::NotEligible {
                months_completed: eligibility.months_completed,
            });
        }

        if self
            .certificates
            .find_active(member_id, certificate_type, None, now)
            .await?
            .is_some()
        {
            return Err(MembershipError::AlreadyIssued);
        }

        let issued = self.store_certificate(&member, certificate_type, None, now).await?;
        tracing::info!(
            member_id = %member_id,
            certificate_id = %issued.id,
            certificate_type = certificate_type.as_str(),
            "certificate issued"
        );
        Ok(issued)
    }

    /// Issues the attendance certificate of an event
    pub async fn issue_event_certificate(
        &self,
        member_id: Uuid,
        event_id: Uuid,
        now: DateTime<Utc>,
    ) -> MembershipResult<Certificate> {
        let event = self
            .events
            .find_event(event_id)
            .await?
            .ok_or(MembershipError::EventNotFound)?;
        let registration = self
            .events
            .find_registration(event_id, member_id)
            .await?
            .ok_or(MembershipError::RegistrationNotFound)?;

        if !registration.attended {
            return Err(MembershipError::NotAttended);
        }
        if registration.certificate_issued {
            return Err(MembershipError::AlreadyIssued);
        }

        let member = self.member(member_id).await?;
        let issued = match self
            .store_certificate(&member, CertificateType::Evento, Some(&event), now)
            .await
        {
            Ok(issued) => issued,
            Err(MembershipError::AlreadyIssued) => {
                // The row exists but the registration was never flagged
                self.events.mark_certificate_issued(event_id, member_id).await?;
                return Err(MembershipError::AlreadyIssued);
            }
            Err(e) => return Err(e),
        };
        self.events.mark_certificate_issued(event_id, member_id).await?;

        tracing::info!(
            member_id = %member_id,
            event_id = %event_id,
            certificate_id = %issued.id,
            "event certificate issued"
        );
        Ok(issued)
    }

    async fn store_certificate(
        &self,
        member: &Member,
        certificate_type: CertificateType,
        event: Option<&Event>,
        now: DateTime<Utc>,
    ) -> MembershipResult<Certificate> {
        let id = Uuid::new_v4();
        let document = certificate::render(id, certificate_type, member, event, now);
        let key = certificate::artifact_key(member.id, id);

        self.artifacts.put(&key, Bytes::from(document)).await?;

        let created = self
            .certificates
            .create(NewCertificate {
                id,
                member_id: member.id,
                certificate_type,
                event_id: event.map(|e| e.id),
                issue_date: now,
                expiry_date: None,
                file_ref: key.clone(),
            })
            .await;

        match created {
            Ok(certificate) => Ok(certificate),
            Err(e) => {
                storage::discard(self.artifacts.as_ref(), &key).await;
                match e {
                    RepositoryError::Conflict(_) => Err(MembershipError::AlreadyIssued),
                    e => Err(e.into()),
                }
            }
        }
    }

    /// Records a payment and applies its side effects
    pub async fn record_payment(
        &self,
        data: CreatePayment,
        now: DateTime<Utc>,
    ) -> MembershipResult<Payment> {
        self.member(data.member_id).await?;

        let payment = self.payments.create(data).await?;
        tracing::info!(
            payment_id = %payment.id,
            member_id = %payment.member_id,
            status = payment.status.as_str(),
            "payment recorded"
        );

        self.settle(&payment, now).await?;
        Ok(payment)
    }

    /// Moves a payment to `target`, enforcing the transition table
    ///
    /// A payment becoming paid without a date is dated `now`.
    pub async fn change_payment_status(
        &self,
        payment_id: Uuid,
        target: PaymentStatus,
        now: DateTime<Utc>,
    ) -> MembershipResult<Payment> {
        let current = self
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or(MembershipError::PaymentNotFound)?;

        self.transition(current, target, None, now).await
    }

    async fn transition(
        &self,
        current: Payment,
        target: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> MembershipResult<Payment> {
        if current.status == target {
            return Ok(current);
        }
        if !current.status.can_transition_to(&target) {
            return Err(MembershipError::InvalidTransition {
                from: current.status,
                to: target,
            });
        }

        let payment_date = match target {
            PaymentStatus::Paid => Some(paid_at.or(current.payment_date).unwrap_or(now)),
            _ => None,
        };

        let updated = self
            .payments
            .update_status(current.id, target, payment_date)
            .await?
            .ok_or(MembershipError::PaymentNotFound)?;

        tracing::info!(
            payment_id = %updated.id,
            from = current.status.as_str(),
            to = target.as_str(),
            "payment status changed"
        );

        self.settle(&updated, now).await?;
        Ok(updated)
    }

    /// Applies a processor notification, idempotently by external id
    pub async fn apply_notification(
        &self,
        notification: PaymentNotification,
        now: DateTime<Utc>,
    ) -> MembershipResult<Payment> {
        match self
            .payments
            .find_by_external_id(&notification.external_id)
            .await?
        {
            Some(existing) => {
                self.transition(existing, notification.status, notification.paid_at, now)
                    .await
            }
            None => {
                let payment_date = match notification.status {
                    PaymentStatus::Paid => Some(notification.paid_at.unwrap_or(now)),
                    _ => notification.paid_at,
                };

                self.record_payment(
                    CreatePayment {
                        member_id: notification.member_id,
                        amount_cents: notification.amount_cents,
                        plan: notification.plan,
                        status: notification.status,
                        method: notification.method,
                        external_id: Some(notification.external_id),
                        payment_date,
                        due_date: notification.due_date.unwrap_or(now),
                    },
                    now,
                )
                .await
            }
        }
    }

    /// Side effects of a payment row reaching its current state
    async fn settle(&self, payment: &Payment, now: DateTime<Utc>) -> MembershipResult<()> {
        if let Some(coverage_end) = payment.coverage_end() {
            self.apply_paid(payment, coverage_end, now).await?;
        }

        self.resolve_status(payment.member_id, now).await?;
        Ok(())
    }

    async fn apply_paid(
        &self,
        payment: &Payment,
        coverage_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> MembershipResult<()> {
        let member = self.member(payment.member_id).await?;

        if let (Some(cancelled_at), Some(paid_at)) = (member.cancelled_at, payment.payment_date) {
            if paid_at > cancelled_at {
                self.members.set_cancelled_at(member.id, None).await?;
                tracing::info!(member_id = %member.id, "membership reinstated by payment");
            }
        }

        if coverage_end <= now {
            return Ok(());
        }

        match self.credentials.find_active(member.id).await? {
            Some(active) => {
                let expiry = active.expiry_date.max(coverage_end);
                if expiry != active.expiry_date {
                    self.credentials.extend(active.id, expiry).await?;
                    tracing::debug!(
                        credential_id = %active.id,
                        expiry = %expiry,
                        "credential extended"
                    );
                }
            }
            None => {
                self.issue_credential(member.id, coverage_end, now).await?;
            }
        }

        Ok(())
    }

    /// Issues a new active credential, replacing any other
    pub async fn issue_credential(
        &self,
        member_id: Uuid,
        expiry_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> MembershipResult<Credential> {
        let mut last_conflict = None;

        for _ in 0..CREDENTIAL_NUMBER_ATTEMPTS {
            let number = credential::generate_number(now);
            let code = credential::validation_code(&self.credential_secret, &number)
                .map_err(|e| MembershipError::Credential(e.to_string()))?;

            let issued = self
                .credentials
                .issue(NewCredential {
                    member_id,
                    credential_number: number,
                    validation_code: code,
                    issue_date: now,
                    expiry_date,
                })
                .await;

            match issued {
                Ok(credential) => {
                    tracing::info!(
                        member_id = %member_id,
                        credential_number = %credential.credential_number,
                        "credential issued"
                    );
                    return Ok(credential);
                }
                Err(RepositoryError::Conflict(constraint)) => {
                    tracing::warn!(%constraint, "credential number collision, retrying");
                    last_conflict = Some(constraint);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RepositoryError::Conflict(last_conflict.unwrap_or_default()).into())
    }

    /// The member's latest credential, marked expired once past its expiry
    pub async fn current_credential(
        &self,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> MembershipResult<Option<Credential>> {
        match self.credentials.latest(member_id).await? {
            Some(credential) => Ok(Some(self.refresh_expiry(credential, now).await?)),
            None => Ok(None),
        }
    }

    async fn refresh_expiry(
        &self,
        mut credential: Credential,
        now: DateTime<Utc>,
    ) -> MembershipResult<Credential> {
        if credential.status == CredentialStatus::Active && credential.expiry_date <= now {
            self.credentials
                .set_status(credential.id, CredentialStatus::Expired)
                .await?;
            credential.status = CredentialStatus::Expired;
        }
        Ok(credential)
    }

    /// Public validation of a credential number or QR code
    pub async fn validate_credential(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> MembershipResult<CredentialValidation> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(CredentialValidation::not_found());
        }

        let Some(found) = self.credentials.find_by_number_or_code(value).await? else {
            return Ok(CredentialValidation::not_found());
        };
        let Some(member) = self.members.find_by_id(found.member_id).await? else {
            return Ok(CredentialValidation::not_found());
        };

        let credential = self.refresh_expiry(found, now).await?;
        let standing = self.resolve_status(member.id, now).await?;

        Ok(CredentialValidation::judge(&credential, &member, &standing, now))
    }

    /// Cancels a membership; payments made afterwards reinstate it
    pub async fn cancel_membership(
        &self,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> MembershipResult<SubscriptionStanding> {
        if !self.members.set_cancelled_at(member_id, Some(now)).await? {
            return Err(MembershipError::MemberNotFound);
        }
        tracing::info!(member_id = %member_id, "membership cancelled");

        self.resolve_status(member_id, now).await
    }

    pub async fn register_for_event(
        &self,
        member_id: Uuid,
        event_id: Uuid,
    ) -> MembershipResult<EventRegistration> {
        let event = self
            .events
            .find_event(event_id)
            .await?
            .ok_or(MembershipError::EventNotFound)?;

        if let Some(capacity) = event.capacity {
            if self.events.registration_count(event_id).await? >= i64::from(capacity) {
                return Err(MembershipError::EventFull);
            }
        }

        match self.events.register(event_id, member_id).await {
            Ok(registration) => Ok(registration),
            Err(RepositoryError::Conflict(_)) => Err(MembershipError::AlreadyRegistered),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn unregister_from_event(
        &self,
        member_id: Uuid,
        event_id: Uuid,
    ) -> MembershipResult<()> {
        if self.events.unregister(event_id, member_id).await? {
            Ok(())
        } else {
            Err(MembershipError::RegistrationNotFound)
        }
    }

    pub async fn set_attendance(
        &self,
        event_id: Uuid,
        member_id: Uuid,
        attended: bool,
    ) -> MembershipResult<EventRegistration> {
        self.events
            .set_attended(event_id, member_id, attended)
            .await?
            .ok_or(MembershipError::RegistrationNotFound)
    }

    pub async fn registrations(&self, event_id: Uuid) -> MembershipResult<Vec<EventRegistration>> {
        if self.events.find_event(event_id).await?.is_none() {
            return Err(MembershipError::EventNotFound);
        }
        Ok(self.events.list_registrations(event_id).await?)
    }
}
