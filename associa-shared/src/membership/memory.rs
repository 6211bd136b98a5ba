/// In-memory adapters for the repository ports
///
/// One [`InMemoryStore`] implements every port so that tests can share state
/// across them. Unique constraints of the PostgreSQL schema are reproduced and
/// reported with the same constraint names.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::{
    CertificateRepository, CredentialRepository, EventRepository, MemberRepository,
    PaymentLedger, RepoResult, RepositoryError,
};
use crate::models::certificate::{Certificate, CertificateType, NewCertificate};
use crate::models::credential::{Credential, CredentialStatus, NewCredential};
use crate::models::event::{Event, EventRegistration};
use crate::models::member::{CreateMember, Member, SubscriptionStatus, UpdateMember};
use crate::models::payment::{CreatePayment, Payment, PaymentStatus};

#[derive(Debug, Default)]
struct Tables {
    members: HashMap<Uuid, Member>,
    payments: HashMap<Uuid, Payment>,
    credentials: HashMap<Uuid, Credential>,
    certificates: HashMap<Uuid, Certificate>,
    events: HashMap<Uuid, Event>,
    registrations: Vec<EventRegistration>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

fn conflict<T>(constraint: &str) -> RepoResult<T> {
    Err(RepositoryError::Conflict(constraint.to_string()))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a member as-is, e.g. with a backdated `created_at`
    pub async fn insert_member(&self, member: Member) {
        self.tables.write().await.members.insert(member.id, member);
    }

    /// Inserts a payment as-is
    pub async fn insert_payment(&self, payment: Payment) {
        self.tables.write().await.payments.insert(payment.id, payment);
    }

    pub async fn insert_event(&self, event: Event) {
        self.tables.write().await.events.insert(event.id, event);
    }

    /// Number of certificates stored for a member
    pub async fn certificate_count(&self, member_id: Uuid) -> usize {
        self.tables
            .read()
            .await
            .certificates
            .values()
            .filter(|c| c.member_id == member_id)
            .count()
    }

    /// Every credential of a member, in no particular order
    pub async fn credentials_of(&self, member_id: Uuid) -> Vec<Credential> {
        self.tables
            .read()
            .await
            .credentials
            .values()
            .filter(|c| c.member_id == member_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MemberRepository for InMemoryStore {
    async fn create(&self, data: CreateMember) -> RepoResult<Member> {
        let mut tables = self.tables.write().await;

        if tables
            .members
            .values()
            .any(|m| m.email.eq_ignore_ascii_case(&data.email))
        {
            return conflict("members_email_key");
        }
        if tables.members.values().any(|m| m.cpf == data.cpf) {
            return conflict("members_cpf_key");
        }

        let now = Utc::now();
        let member = Member {
            id: Uuid::new_v4(),
            name: data.name,
            email: data.email,
            password_hash: data.password_hash,
            phone: data.phone,
            cpf: data.cpf,
            occupation: data.occupation,
            graduated: data.graduated,
            role: data.role,
            subscription_status: SubscriptionStatus::Pending,
            photo_url: None,
            cancelled_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.members.insert(member.id, member.clone());
        Ok(member)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Member>> {
        Ok(self.tables.read().await.members.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<Member>> {
        Ok(self
            .tables
            .read()
            .await
            .members
            .values()
            .find(|m| m.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> RepoResult<Vec<Member>> {
        let tables = self.tables.read().await;
        let mut members: Vec<Member> = tables.members.values().cloned().collect();
        members.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(members
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> RepoResult<i64> {
        Ok(self.tables.read().await.members.len() as i64)
    }

    async fn update(&self, id: Uuid, data: UpdateMember) -> RepoResult<Option<Member>> {
        let mut tables = self.tables.write().await;

        if let Some(email) = &data.email {
            if tables
                .members
                .values()
                .any(|m| m.id != id && m.email.eq_ignore_ascii_case(email))
            {
                return conflict("members_email_key");
            }
        }
        if let Some(cpf) = &data.cpf {
            if tables.members.values().any(|m| m.id != id && &m.cpf == cpf) {
                return conflict("members_cpf_key");
            }
        }

        Ok(tables.members.get_mut(&id).map(|member| {
            data.apply_to(member);
            member.clone()
        }))
    }

    async fn set_subscription_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
    ) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .members
            .get_mut(&id)
            .map(|m| {
                m.subscription_status = status;
                m.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn set_cancelled_at(&self, id: Uuid, at: Option<DateTime<Utc>>) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .members
            .get_mut(&id)
            .map(|m| {
                m.cancelled_at = at;
                m.updated_at = Utc::now();
            })
            .is_some())
    }

    async fn touch_last_login(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .members
            .get_mut(&id)
            .map(|m| m.last_login_at = Some(Utc::now()))
            .is_some())
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.members.remove(&id).is_none() {
            return Ok(false);
        }

        tables.payments.retain(|_, p| p.member_id != id);
        tables.credentials.retain(|_, c| c.member_id != id);
        tables.certificates.retain(|_, c| c.member_id != id);
        tables.registrations.retain(|r| r.member_id != id);
        Ok(true)
    }
}

fn most_recent_first(payments: &mut [Payment]) {
    payments.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
}

#[async_trait]
impl PaymentLedger for InMemoryStore {
    async fn latest_for_member(&self, member_id: Uuid) -> RepoResult<Option<Payment>> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .values()
            .filter(|p| p.member_id == member_id)
            .max_by_key(|p| p.recency_key())
            .cloned())
    }

    async fn list_for_member(&self, member_id: Uuid) -> RepoResult<Vec<Payment>> {
        let tables = self.tables.read().await;
        let mut payments: Vec<Payment> = tables
            .payments
            .values()
            .filter(|p| p.member_id == member_id)
            .cloned()
            .collect();
        most_recent_first(&mut payments);
        Ok(payments)
    }

    async fn paid_for_member(&self, member_id: Uuid) -> RepoResult<Vec<Payment>> {
        let tables = self.tables.read().await;
        let mut payments: Vec<Payment> = tables
            .payments
            .values()
            .filter(|p| {
                p.member_id == member_id
                    && p.status == PaymentStatus::Paid
                    && p.payment_date.is_some()
            })
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.payment_date);
        Ok(payments)
    }

    async fn list(&self, limit: i64, offset: i64) -> RepoResult<Vec<Payment>> {
        let tables = self.tables.read().await;
        let mut payments: Vec<Payment> = tables.payments.values().cloned().collect();
        most_recent_first(&mut payments);

        Ok(payments
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> RepoResult<Option<Payment>> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .values()
            .find(|p| p.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn create(&self, data: CreatePayment) -> RepoResult<Payment> {
        let mut tables = self.tables.write().await;

        if let Some(external_id) = &data.external_id {
            if tables
                .payments
                .values()
                .any(|p| p.external_id.as_ref() == Some(external_id))
            {
                return conflict("payments_external_id_key");
            }
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            member_id: data.member_id,
            amount_cents: data.amount_cents,
            plan: data.plan,
            status: data.status,
            method: data.method,
            external_id: data.external_id,
            payment_date: data.payment_date,
            due_date: data.due_date,
            created_at: now,
            updated_at: now,
        };
        tables.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        payment_date: Option<DateTime<Utc>>,
    ) -> RepoResult<Option<Payment>> {
        let mut tables = self.tables.write().await;
        Ok(tables.payments.get_mut(&id).map(|p| {
            p.status = status;
            if payment_date.is_some() {
                p.payment_date = payment_date;
            }
            p.updated_at = Utc::now();
            p.clone()
        }))
    }
}

#[async_trait]
impl CredentialRepository for InMemoryStore {
    async fn find_active(&self, member_id: Uuid) -> RepoResult<Option<Credential>> {
        Ok(self
            .tables
            .read()
            .await
            .credentials
            .values()
            .find(|c| c.member_id == member_id && c.status == CredentialStatus::Active)
            .cloned())
    }

    async fn latest(&self, member_id: Uuid) -> RepoResult<Option<Credential>> {
        Ok(self
            .tables
            .read()
            .await
            .credentials
            .values()
            .filter(|c| c.member_id == member_id)
            .max_by_key(|c| (c.issue_date, c.created_at))
            .cloned())
    }

    async fn find_by_number_or_code(&self, value: &str) -> RepoResult<Option<Credential>> {
        let code = value.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .credentials
            .values()
            .find(|c| c.credential_number.eq_ignore_ascii_case(value) || c.validation_code == code)
            .cloned())
    }

    async fn issue(&self, data: NewCredential) -> RepoResult<Credential> {
        let mut tables = self.tables.write().await;

        if tables
            .credentials
            .values()
            .any(|c| c.credential_number == data.credential_number)
        {
            return conflict("credentials_credential_number_key");
        }

        let now = Utc::now();
        for existing in tables.credentials.values_mut() {
            if existing.member_id == data.member_id && existing.status == CredentialStatus::Active {
                existing.status = CredentialStatus::Inactive;
                existing.updated_at = now;
            }
        }

        let credential = Credential {
            id: Uuid::new_v4(),
            member_id: data.member_id,
            credential_number: data.credential_number,
            validation_code: data.validation_code,
            issue_date: data.issue_date,
            expiry_date: data.expiry_date,
            status: CredentialStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tables.credentials.insert(credential.id, credential.clone());
        Ok(credential)
    }

    async fn extend(&self, id: Uuid, expiry_date: DateTime<Utc>) -> RepoResult<Option<Credential>> {
        let mut tables = self.tables.write().await;
        Ok(tables.credentials.get_mut(&id).map(|c| {
            c.expiry_date = expiry_date;
            c.updated_at = Utc::now();
            c.clone()
        }))
    }

    async fn set_status(&self, id: Uuid, status: CredentialStatus) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .credentials
            .get_mut(&id)
            .map(|c| {
                c.status = status;
                c.updated_at = Utc::now();
            })
            .is_some())
    }
}

#[async_trait]
impl CertificateRepository for InMemoryStore {
    async fn list_for_member(&self, member_id: Uuid) -> RepoResult<Vec<Certificate>> {
        let tables = self.tables.read().await;
        let mut certificates: Vec<Certificate> = tables
            .certificates
            .values()
            .filter(|c| c.member_id == member_id)
            .cloned()
            .collect();
        certificates.sort_by(|a, b| b.issue_date.cmp(&a.issue_date));
        Ok(certificates)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Certificate>> {
        Ok(self.tables.read().await.certificates.get(&id).cloned())
    }

    async fn find_active(
        &self,
        member_id: Uuid,
        certificate_type: CertificateType,
        event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Certificate>> {
        Ok(self
            .tables
            .read()
            .await
            .certificates
            .values()
            .filter(|c| {
                c.member_id == member_id
                    && c.certificate_type == certificate_type
                    && c.event_id == event_id
                    && c.is_active(now)
            })
            .max_by_key(|c| c.issue_date)
            .cloned())
    }

    async fn create(&self, data: NewCertificate) -> RepoResult<Certificate> {
        let mut tables = self.tables.write().await;
        if tables.certificates.contains_key(&data.id) {
            return conflict("certificates_pkey");
        }
        for existing in tables.certificates.values() {
            if existing.member_id != data.member_id {
                continue;
            }
            match (existing.event_id, data.event_id) {
                (None, None) if existing.certificate_type == data.certificate_type => {
                    return conflict("certificates_one_per_type");
                }
                (Some(a), Some(b)) if a == b => return conflict("certificates_one_per_event"),
                _ => {}
            }
        }

        let certificate = Certificate {
            id: data.id,
            member_id: data.member_id,
            certificate_type: data.certificate_type,
            event_id: data.event_id,
            issue_date: data.issue_date,
            expiry_date: data.expiry_date,
            file_ref: data.file_ref,
            created_at: Utc::now(),
        };
        tables.certificates.insert(certificate.id, certificate.clone());
        Ok(certificate)
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn find_event(&self, id: Uuid) -> RepoResult<Option<Event>> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn registration_count(&self, event_id: Uuid) -> RepoResult<i64> {
        Ok(self
            .tables
            .read()
            .await
            .registrations
            .iter()
            .filter(|r| r.event_id == event_id)
            .count() as i64)
    }

    async fn register(&self, event_id: Uuid, member_id: Uuid) -> RepoResult<EventRegistration> {
        let mut tables = self.tables.write().await;
        if tables
            .registrations
            .iter()
            .any(|r| r.event_id == event_id && r.member_id == member_id)
        {
            return conflict("event_registrations_event_member_key");
        }

        let registration = EventRegistration {
            id: Uuid::new_v4(),
            event_id,
            member_id,
            attended: false,
            certificate_issued: false,
            created_at: Utc::now(),
        };
        tables.registrations.push(registration.clone());
        Ok(registration)
    }

    async fn unregister(&self, event_id: Uuid, member_id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.registrations.len();
        tables
            .registrations
            .retain(|r| !(r.event_id == event_id && r.member_id == member_id));
        Ok(tables.registrations.len() < before)
    }

    async fn find_registration(
        &self,
        event_id: Uuid,
        member_id: Uuid,
    ) -> RepoResult<Option<EventRegistration>> {
        Ok(self
            .tables
            .read()
            .await
            .registrations
            .iter()
            .find(|r| r.event_id == event_id && r.member_id == member_id)
            .cloned())
    }

    async fn list_registrations(&self, event_id: Uuid) -> RepoResult<Vec<EventRegistration>> {
        Ok(self
            .tables
            .read()
            .await
            .registrations
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn set_attended(
        &self,
        event_id: Uuid,
        member_id: Uuid,
        attended: bool,
    ) -> RepoResult<Option<EventRegistration>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .registrations
            .iter_mut()
            .find(|r| r.event_id == event_id && r.member_id == member_id)
            .map(|r| {
                r.attended = attended;
                r.clone()
            }))
    }

    async fn mark_certificate_issued(&self, event_id: Uuid, member_id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .registrations
            .iter_mut()
            .find(|r| r.event_id == event_id && r.member_id == member_id)
            .map(|r| r.certificate_issued = true)
            .is_some())
    }
}
