/// Partner benefits directory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const BENEFIT_COLUMNS: &str = "id, partner_name, description, discount, category, link, logo_url, \
     active, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Benefit {
    pub id: Uuid,
    pub partner_name: String,
    pub description: Option<String>,

    /// Free-form discount label, e.g. "15% na mensalidade"
    pub discount: Option<String>,

    pub category: Option<String>,
    pub link: Option<String>,
    pub logo_url: Option<String>,

    /// Inactive benefits are hidden from members
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenefitInput {
    pub partner_name: String,
    pub description: Option<String>,
    pub discount: Option<String>,
    pub category: Option<String>,
    pub link: Option<String>,
    pub logo_url: Option<String>,
    pub active: bool,
}

impl Benefit {
    pub async fn create(pool: &PgPool, data: BenefitInput) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO benefits (partner_name, description, discount, category, link, logo_url, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {BENEFIT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Benefit>(&query)
            .bind(data.partner_name)
            .bind(data.description)
            .bind(data.discount)
            .bind(data.category)
            .bind(data.link)
            .bind(data.logo_url)
            .bind(data.active)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {BENEFIT_COLUMNS} FROM benefits WHERE id = $1");

        sqlx::query_as::<_, Benefit>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Listing; `include_inactive` is used by the back-office
    pub async fn list(pool: &PgPool, include_inactive: bool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {BENEFIT_COLUMNS} FROM benefits WHERE ($1 OR active) ORDER BY partner_name"
        );

        sqlx::query_as::<_, Benefit>(&query)
            .bind(include_inactive)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: BenefitInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE benefits
            SET partner_name = $2, description = $3, discount = $4, category = $5, link = $6,
                logo_url = $7, active = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {BENEFIT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Benefit>(&query)
            .bind(id)
            .bind(data.partner_name)
            .bind(data.description)
            .bind(data.discount)
            .bind(data.category)
            .bind(data.link)
            .bind(data.logo_url)
            .bind(data.active)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM benefits WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
