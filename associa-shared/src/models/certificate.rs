/// Certificate model and database operations
///
/// Certificates are write-once: there is no update or delete path. The artifact
/// itself lives in the artifact store and is referenced by `file_ref`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const CERTIFICATE_COLUMNS: &str =
    "id, member_id, certificate_type, event_id, issue_date, expiry_date, file_ref, created_at";

/// Kind of certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "certificate_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CertificateType {
    /// Free-training membership certificate
    FormacaoLivre,

    /// Postgraduate membership certificate
    PosGraduacao,

    /// Event attendance certificate
    Evento,
}

impl CertificateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateType::FormacaoLivre => "formacao_livre",
            CertificateType::PosGraduacao => "pos_graduacao",
            CertificateType::Evento => "evento",
        }
    }

    /// Title printed on the document
    pub fn title(&self) -> &'static str {
        match self {
            CertificateType::FormacaoLivre => "Certificado de Formação Livre",
            CertificateType::PosGraduacao => "Certificado de Pós-Graduação",
            CertificateType::Evento => "Certificado de Participação",
        }
    }

    /// Whether issuance depends on the continuous-membership rule
    pub fn requires_membership_streak(&self) -> bool {
        match self {
            CertificateType::FormacaoLivre | CertificateType::PosGraduacao => true,
            CertificateType::Evento => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Certificate {
    pub id: Uuid,
    pub member_id: Uuid,
    pub certificate_type: CertificateType,

    /// Set only for event certificates
    pub event_id: Option<Uuid>,

    pub issue_date: DateTime<Utc>,

    /// None means the certificate never expires
    pub expiry_date: Option<DateTime<Utc>>,

    /// Artifact store key
    #[serde(skip_serializing)]
    pub file_ref: String,

    pub created_at: DateTime<Utc>,
}

impl Certificate {
    /// Not expired at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.map_or(true, |expiry| expiry > now)
    }
}

#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub id: Uuid,
    pub member_id: Uuid,
    pub certificate_type: CertificateType,
    pub event_id: Option<Uuid>,
    pub issue_date: DateTime<Utc>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub file_ref: String,
}

impl Certificate {
    pub async fn create(pool: &PgPool, data: NewCertificate) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO certificates (id, member_id, certificate_type, event_id,
                                      issue_date, expiry_date, file_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CERTIFICATE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Certificate>(&query)
            .bind(data.id)
            .bind(data.member_id)
            .bind(data.certificate_type)
            .bind(data.event_id)
            .bind(data.issue_date)
            .bind(data.expiry_date)
            .bind(data.file_ref)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE id = $1");

        sqlx::query_as::<_, Certificate>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Certificates of a member, newest first
    pub async fn list_for_member(pool: &PgPool, member_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE member_id = $1 ORDER BY issue_date DESC"
        );

        sqlx::query_as::<_, Certificate>(&query)
            .bind(member_id)
            .fetch_all(pool)
            .await
    }

    /// Active certificate of the given type and event reference, if any
    ///
    /// `event_id = None` matches only certificates without an event.
    pub async fn find_active(
        pool: &PgPool,
        member_id: Uuid,
        certificate_type: CertificateType,
        event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {CERTIFICATE_COLUMNS} FROM certificates
            WHERE member_id = $1
              AND certificate_type = $2
              AND event_id IS NOT DISTINCT FROM $3
              AND (expiry_date IS NULL OR expiry_date > $4)
            ORDER BY issue_date DESC
            LIMIT 1
            "#
        );

        sqlx::query_as::<_, Certificate>(&query)
            .bind(member_id)
            .bind(certificate_type)
            .bind(event_id)
            .bind(now)
            .fetch_optional(pool)
            .await
    }
}
