/// Repository ports
///
/// The subscription core talks to storage only through these traits.
/// [`super::postgres`] implements them over a `PgPool` by delegating to the
/// model methods; [`super::memory`] keeps everything in process memory for
/// tests.
///
/// Implementations must be stateless over their backing store so that one
/// instance can be shared as `Arc<dyn Trait>` across requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::certificate::{Certificate, CertificateType, NewCertificate};
use crate::models::credential::{Credential, CredentialStatus, NewCredential};
use crate::models::event::{Event, EventRegistration};
use crate::models::member::{CreateMember, Member, SubscriptionStatus, UpdateMember};
use crate::models::payment::{CreatePayment, Payment, PaymentStatus};

/// PostgreSQL error code for unique violations
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Unique constraint violated; carries the constraint name
    #[error("Conflict on {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl RepositoryError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::Conflict(_))
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db.constraint().unwrap_or("unique").to_string();
                return RepositoryError::Conflict(constraint);
            }
        }
        RepositoryError::Database(err)
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Creates a member
    ///
    /// # Errors
    ///
    /// - `Conflict("members_email_key")` or `Conflict("members_cpf_key")` on duplicates
    async fn create(&self, data: CreateMember) -> RepoResult<Member>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Member>>;

    /// Case-insensitive lookup
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<Member>>;

    /// Members ordered by enrollment date, newest first
    async fn list(&self, limit: i64, offset: i64) -> RepoResult<Vec<Member>>;

    async fn count(&self) -> RepoResult<i64>;

    async fn update(&self, id: Uuid, data: UpdateMember) -> RepoResult<Option<Member>>;

    async fn set_subscription_status(&self, id: Uuid, status: SubscriptionStatus)
        -> RepoResult<bool>;

    async fn set_cancelled_at(&self, id: Uuid, at: Option<DateTime<Utc>>) -> RepoResult<bool>;

    async fn touch_last_login(&self, id: Uuid) -> RepoResult<bool>;

    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

/// Payment history, the source of truth for standing
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Most recent payment by `COALESCE(payment_date, due_date)`, then `created_at`
    async fn latest_for_member(&self, member_id: Uuid) -> RepoResult<Option<Payment>>;

    /// All payments of a member, most recent first
    async fn list_for_member(&self, member_id: Uuid) -> RepoResult<Vec<Payment>>;

    /// Paid payments in chronological order
    async fn paid_for_member(&self, member_id: Uuid) -> RepoResult<Vec<Payment>>;

    async fn list(&self, limit: i64, offset: i64) -> RepoResult<Vec<Payment>>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Payment>>;

    async fn find_by_external_id(&self, external_id: &str) -> RepoResult<Option<Payment>>;

    async fn create(&self, data: CreatePayment) -> RepoResult<Payment>;

    /// Writes a status change; `payment_date` is kept when `None`
    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        payment_date: Option<DateTime<Utc>>,
    ) -> RepoResult<Option<Payment>>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn find_active(&self, member_id: Uuid) -> RepoResult<Option<Credential>>;

    /// Most recently issued, whatever its status
    async fn latest(&self, member_id: Uuid) -> RepoResult<Option<Credential>>;

    /// Lookup by printed number (case-insensitive) or QR validation code
    async fn find_by_number_or_code(&self, value: &str) -> RepoResult<Option<Credential>>;

    /// Inserts an active credential and deactivates the previous one atomically
    async fn issue(&self, data: NewCredential) -> RepoResult<Credential>;

    async fn extend(&self, id: Uuid, expiry_date: DateTime<Utc>) -> RepoResult<Option<Credential>>;

    async fn set_status(&self, id: Uuid, status: CredentialStatus) -> RepoResult<bool>;
}

/// Write-once certificate store
#[async_trait]
pub trait CertificateRepository: Send + Sync {
    async fn list_for_member(&self, member_id: Uuid) -> RepoResult<Vec<Certificate>>;

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Certificate>>;

    /// Unexpired certificate of the type; `event_id = None` matches only
    /// certificates without an event
    async fn find_active(
        &self,
        member_id: Uuid,
        certificate_type: CertificateType,
        event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Certificate>>;

    async fn create(&self, data: NewCertificate) -> RepoResult<Certificate>;
}

/// Event lookups and registrations
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn find_event(&self, id: Uuid) -> RepoResult<Option<Event>>;

    async fn registration_count(&self, event_id: Uuid) -> RepoResult<i64>;

    /// # Errors
    ///
    /// - `Conflict("event_registrations_event_member_key")` when already registered
    async fn register(&self, event_id: Uuid, member_id: Uuid) -> RepoResult<EventRegistration>;

    async fn unregister(&self, event_id: Uuid, member_id: Uuid) -> RepoResult<bool>;

    async fn find_registration(
        &self,
        event_id: Uuid,
        member_id: Uuid,
    ) -> RepoResult<Option<EventRegistration>>;

    async fn list_registrations(&self, event_id: Uuid) -> RepoResult<Vec<EventRegistration>>;

    async fn set_attended(
        &self,
        event_id: Uuid,
        member_id: Uuid,
        attended: bool,
    ) -> RepoResult<Option<EventRegistration>>;

    async fn mark_certificate_issued(&self, event_id: Uuid, member_id: Uuid) -> RepoResult<bool>;
}

/// Bundle of every repository port
#[derive(Clone)]
pub struct Repositories {
    pub members: Arc<dyn MemberRepository>,
    pub payments: Arc<dyn PaymentLedger>,
    pub credentials: Arc<dyn CredentialRepository>,
    pub certificates: Arc<dyn CertificateRepository>,
    pub events: Arc<dyn EventRepository>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        use super::postgres::*;

        Self {
            members: Arc::new(PgMemberRepository::new(pool.clone())),
            payments: Arc::new(PgPaymentLedger::new(pool.clone())),
            credentials: Arc::new(PgCredentialRepository::new(pool.clone())),
            certificates: Arc::new(PgCertificateRepository::new(pool.clone())),
            events: Arc::new(PgEventRepository::new(pool)),
        }
    }

    /// In-memory repositories sharing one store
    pub fn in_memory(store: Arc<super::memory::InMemoryStore>) -> Self {
        Self {
            members: store.clone(),
            payments: store.clone(),
            credentials: store.clone(),
            certificates: store.clone(),
            events: store,
        }
    }
}
