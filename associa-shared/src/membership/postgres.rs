/// PostgreSQL adapters for the repository ports
///
/// Thin wrappers: each method delegates to the matching model method and maps
/// `sqlx::Error` into [`RepositoryError`] (unique violations become conflicts).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::repository::{
    CertificateRepository, CredentialRepository, EventRepository, MemberRepository,
    PaymentLedger, RepoResult,
};
use crate::models::certificate::{Certificate, CertificateType, NewCertificate};
use crate::models::credential::{Credential, CredentialStatus, NewCredential};
use crate::models::event::{Event, EventRegistration};
use crate::models::member::{CreateMember, Member, SubscriptionStatus, UpdateMember};
use crate::models::payment::{CreatePayment, Payment, PaymentStatus};

macro_rules! pg_adapter {
    ($name:ident) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            pool: PgPool,
        }

        impl $name {
            pub fn new(pool: PgPool) -> Self {
                Self { pool }
            }
        }
    };
}

pg_adapter!(PgMemberRepository);
pg_adapter!(PgPaymentLedger);
pg_adapter!(PgCredentialRepository);
pg_adapter!(PgCertificateRepository);
pg_adapter!(PgEventRepository);

#[async_trait]
impl MemberRepository for PgMemberRepository {
    async fn create(&self, data: CreateMember) -> RepoResult<Member> {
        Ok(Member::create(&self.pool, data).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Member>> {
        Ok(Member::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<Member>> {
        Ok(Member::find_by_email(&self.pool, email).await?)
    }

    async fn list(&self, limit: i64, offset: i64) -> RepoResult<Vec<Member>> {
        Ok(Member::list(&self.pool, limit, offset).await?)
    }

    async fn count(&self) -> RepoResult<i64> {
        Ok(Member::count(&self.pool).await?)
    }

    async fn update(&self, id: Uuid, data: UpdateMember) -> RepoResult<Option<Member>> {
        Ok(Member::update(&self.pool, id, data).await?)
    }

    async fn set_subscription_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
    ) -> RepoResult<bool> {
        Ok(Member::set_subscription_status(&self.pool, id, status).await?)
    }

    async fn set_cancelled_at(&self, id: Uuid, at: Option<DateTime<Utc>>) -> RepoResult<bool> {
        Ok(Member::set_cancelled_at(&self.pool, id, at).await?)
    }

    async fn touch_last_login(&self, id: Uuid) -> RepoResult<bool> {
        Ok(Member::update_last_login(&self.pool, id).await?)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(Member::delete(&self.pool, id).await?)
    }
}

#[async_trait]
impl PaymentLedger for PgPaymentLedger {
    async fn latest_for_member(&self, member_id: Uuid) -> RepoResult<Option<Payment>> {
        Ok(Payment::latest_for_member(&self.pool, member_id).await?)
    }

    async fn list_for_member(&self, member_id: Uuid) -> RepoResult<Vec<Payment>> {
        Ok(Payment::list_for_member(&self.pool, member_id).await?)
    }

    async fn paid_for_member(&self, member_id: Uuid) -> RepoResult<Vec<Payment>> {
        Ok(Payment::list_paid_for_member(&self.pool, member_id).await?)
    }

    async fn list(&self, limit: i64, offset: i64) -> RepoResult<Vec<Payment>> {
        Ok(Payment::list(&self.pool, limit, offset).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Payment>> {
        Ok(Payment::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_external_id(&self, external_id: &str) -> RepoResult<Option<Payment>> {
        Ok(Payment::find_by_external_id(&self.pool, external_id).await?)
    }

    async fn create(&self, data: CreatePayment) -> RepoResult<Payment> {
        Ok(Payment::create(&self.pool, data).await?)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        payment_date: Option<DateTime<Utc>>,
    ) -> RepoResult<Option<Payment>> {
        Ok(Payment::update_status(&self.pool, id, status, payment_date).await?)
    }
}

#[async_trait]
impl CredentialRepository for PgCredentialRepository {
    async fn find_active(&self, member_id: Uuid) -> RepoResult<Option<Credential>> {
        Ok(Credential::find_active_for_member(&self.pool, member_id).await?)
    }

    async fn latest(&self, member_id: Uuid) -> RepoResult<Option<Credential>> {
        Ok(Credential::latest_for_member(&self.pool, member_id).await?)
    }

    async fn find_by_number_or_code(&self, value: &str) -> RepoResult<Option<Credential>> {
        Ok(Credential::find_by_number_or_code(&self.pool, value).await?)
    }

    async fn issue(&self, data: NewCredential) -> RepoResult<Credential> {
        Ok(Credential::issue(&self.pool, data).await?)
    }

    async fn extend(&self, id: Uuid, expiry_date: DateTime<Utc>) -> RepoResult<Option<Credential>> {
        Ok(Credential::extend(&self.pool, id, expiry_date).await?)
    }

    async fn set_status(&self, id: Uuid, status: CredentialStatus) -> RepoResult<bool> {
        Ok(Credential::set_status(&self.pool, id, status).await?)
    }
}

#[async_trait]
impl CertificateRepository for PgCertificateRepository {
    async fn list_for_member(&self, member_id: Uuid) -> RepoResult<Vec<Certificate>> {
        Ok(Certificate::list_for_member(&self.pool, member_id).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Certificate>> {
        Ok(Certificate::find_by_id(&self.pool, id).await?)
    }

    async fn find_active(
        &self,
        member_id: Uuid,
        certificate_type: CertificateType,
        event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Certificate>> {
        Ok(Certificate::find_active(&self.pool, member_id, certificate_type, event_id, now).await?)
    }

    async fn create(&self, data: NewCertificate) -> RepoResult<Certificate> {
        Ok(Certificate::create(&self.pool, data).await?)
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn find_event(&self, id: Uuid) -> RepoResult<Option<Event>> {
        Ok(Event::find_by_id(&self.pool, id).await?)
    }

    async fn registration_count(&self, event_id: Uuid) -> RepoResult<i64> {
        Ok(Event::registration_count(&self.pool, event_id).await?)
    }

    async fn register(&self, event_id: Uuid, member_id: Uuid) -> RepoResult<EventRegistration> {
        Ok(EventRegistration::create(&self.pool, event_id, member_id).await?)
    }

    async fn unregister(&self, event_id: Uuid, member_id: Uuid) -> RepoResult<bool> {
        Ok(EventRegistration::delete(&self.pool, event_id, member_id).await?)
    }

    async fn find_registration(
        &self,
        event_id: Uuid,
        member_id: Uuid,
    ) -> RepoResult<Option<EventRegistration>> {
        Ok(EventRegistration::find(&self.pool, event_id, member_id).await?)
    }

    async fn list_registrations(&self, event_id: Uuid) -> RepoResult<Vec<EventRegistration>> {
        Ok(EventRegistration::list_for_event(&self.pool, event_id).await?)
    }

    async fn set_attended(
        &self,
        event_id: Uuid,
        member_id: Uuid,
        attended: bool,
    ) -> RepoResult<Option<EventRegistration>> {
        Ok(EventRegistration::set_attended(&self.pool, event_id, member_id, attended).await?)
    }

    async fn mark_certificate_issued(&self, event_id: Uuid, member_id: Uuid) -> RepoResult<bool> {
        Ok(EventRegistration::mark_certificate_issued(&self.pool, event_id, member_id).await?)
    }
}
