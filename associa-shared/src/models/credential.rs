/// Credential model and database operations
///
/// The digital membership card. A member has at most one `active` credential at
/// any time; the partial unique index `credentials_one_active_per_member`
/// enforces it and [`Credential::issue`] deactivates the previous one in the
/// same transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const CREDENTIAL_COLUMNS: &str = "id, member_id, credential_number, validation_code, issue_date, \
     expiry_date, status, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "credential_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Active,
    Inactive,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Credential {
    pub id: Uuid,
    pub member_id: Uuid,

    /// Printed number, e.g. `ASC-2026-7KQ2M9XD`
    pub credential_number: String,

    /// Code embedded in the QR, derived from the number
    pub validation_code: String,

    pub issue_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub status: CredentialStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    /// Active and not past its expiry at `now`
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status == CredentialStatus::Active && self.expiry_date > now
    }
}

/// Input for issuing a credential
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub member_id: Uuid,
    pub credential_number: String,
    pub validation_code: String,
    pub issue_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
}

impl Credential {
    /// Issues a new active credential, deactivating any other active one
    pub async fn issue(pool: &PgPool, data: NewCredential) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE credentials SET status = 'inactive', updated_at = NOW()
            WHERE member_id = $1 AND status = 'active'
            "#,
        )
        .bind(data.member_id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            r#"
            INSERT INTO credentials (member_id, credential_number, validation_code,
                                     issue_date, expiry_date, status)
            VALUES ($1, $2, $3, $4, $5, 'active')
            RETURNING {CREDENTIAL_COLUMNS}
            "#
        );

        let credential = sqlx::query_as::<_, Credential>(&query)
            .bind(data.member_id)
            .bind(data.credential_number)
            .bind(data.validation_code)
            .bind(data.issue_date)
            .bind(data.expiry_date)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(credential)
    }

    pub async fn find_active_for_member(
        pool: &PgPool,
        member_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE member_id = $1 AND status = 'active'"
        );

        sqlx::query_as::<_, Credential>(&query)
            .bind(member_id)
            .fetch_optional(pool)
            .await
    }

    /// Most recently issued credential of a member, whatever its status
    pub async fn latest_for_member(
        pool: &PgPool,
        member_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {CREDENTIAL_COLUMNS} FROM credentials
            WHERE member_id = $1
            ORDER BY issue_date DESC, created_at DESC
            LIMIT 1
            "#
        );

        sqlx::query_as::<_, Credential>(&query)
            .bind(member_id)
            .fetch_optional(pool)
            .await
    }

    /// Looks a credential up by printed number or by QR validation code
    pub async fn find_by_number_or_code(
        pool: &PgPool,
        value: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {CREDENTIAL_COLUMNS} FROM credentials
            WHERE UPPER(credential_number) = UPPER($1) OR validation_code = LOWER($1)
            LIMIT 1
            "#
        );

        sqlx::query_as::<_, Credential>(&query)
            .bind(value)
            .fetch_optional(pool)
            .await
    }

    /// Moves the expiry date of a credential
    pub async fn extend(
        pool: &PgPool,
        id: Uuid,
        expiry_date: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE credentials SET expiry_date = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CREDENTIAL_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Credential>(&query)
            .bind(id)
            .bind(expiry_date)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_status(
        pool: &PgPool,
        id: Uuid,
        status: CredentialStatus,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE credentials SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
