/// E-book catalog
///
/// `file_ref` is the artifact store key of the uploaded document; it is never
/// serialized, downloads go through `GET /api/ebooks/:id/download`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const EBOOK_COLUMNS: &str =
    "id, title, author, description, category, cover_url, file_ref, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ebook {
    pub id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub cover_url: Option<String>,

    #[serde(skip_serializing)]
    pub file_ref: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ebook {
    pub fn has_file(&self) -> bool {
        self.file_ref.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbookInput {
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub cover_url: Option<String>,
}

impl Ebook {
    pub async fn create(pool: &PgPool, data: EbookInput) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO ebooks (title, author, description, category, cover_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {EBOOK_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Ebook>(&query)
            .bind(data.title)
            .bind(data.author)
            .bind(data.description)
            .bind(data.category)
            .bind(data.cover_url)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {EBOOK_COLUMNS} FROM ebooks WHERE id = $1");

        sqlx::query_as::<_, Ebook>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Catalog listing, optionally filtered by category
    pub async fn list(pool: &PgPool, category: Option<&str>) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {EBOOK_COLUMNS} FROM ebooks WHERE ($1::TEXT IS NULL OR category = $1) ORDER BY title"
        );

        sqlx::query_as::<_, Ebook>(&query)
            .bind(category)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: EbookInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE ebooks
            SET title = $2, author = $3, description = $4, category = $5, cover_url = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {EBOOK_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Ebook>(&query)
            .bind(id)
            .bind(data.title)
            .bind(data.author)
            .bind(data.description)
            .bind(data.category)
            .bind(data.cover_url)
            .fetch_optional(pool)
            .await
    }

    /// Points the e-book at a newly stored artifact
    pub async fn set_file_ref(
        pool: &PgPool,
        id: Uuid,
        file_ref: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE ebooks SET file_ref = $2, updated_at = NOW() WHERE id = $1 RETURNING {EBOOK_COLUMNS}"
        );

        sqlx::query_as::<_, Ebook>(&query)
            .bind(id)
            .bind(file_ref)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM ebooks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
