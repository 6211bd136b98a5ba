/// Events and event registrations
///
/// A registration links one member to one event (unique pair). Admins mark
/// attendance after the event; an attended registration entitles the member to
/// one event certificate, after which `certificate_issued` is set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const EVENT_COLUMNS: &str = "id, title, description, location, starts_at, ends_at, capacity, \
     workload_hours, created_at, updated_at";

const REGISTRATION_COLUMNS: &str =
    "id, event_id, member_id, attended, certificate_issued, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,

    /// Maximum number of registrations (None = unlimited)
    pub capacity: Option<i32>,

    /// Hours printed on the attendance certificate
    pub workload_hours: Option<i32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInput {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub workload_hours: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRegistration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub member_id: Uuid,
    pub attended: bool,
    pub certificate_issued: bool,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub async fn create(pool: &PgPool, data: EventInput) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO events (title, description, location, starts_at, ends_at,
                                capacity, workload_hours)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {EVENT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Event>(&query)
            .bind(data.title)
            .bind(data.description)
            .bind(data.location)
            .bind(data.starts_at)
            .bind(data.ends_at)
            .bind(data.capacity)
            .bind(data.workload_hours)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");

        sqlx::query_as::<_, Event>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Events ordered by start date, upcoming first
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY starts_at ASC");

        sqlx::query_as::<_, Event>(&query).fetch_all(pool).await
    }

    /// Replaces every editable field
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: EventInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE events
            SET title = $2, description = $3, location = $4, starts_at = $5, ends_at = $6,
                capacity = $7, workload_hours = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Event>(&query)
            .bind(id)
            .bind(data.title)
            .bind(data.description)
            .bind(data.location)
            .bind(data.starts_at)
            .bind(data.ends_at)
            .bind(data.capacity)
            .bind(data.workload_hours)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn registration_count(pool: &PgPool, id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM event_registrations WHERE event_id = $1")
                .bind(id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}

impl EventRegistration {
    /// Registers a member; the unique pair constraint rejects duplicates
    pub async fn create(
        pool: &PgPool,
        event_id: Uuid,
        member_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO event_registrations (event_id, member_id)
            VALUES ($1, $2)
            RETURNING {REGISTRATION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, EventRegistration>(&query)
            .bind(event_id)
            .bind(member_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        event_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM event_registrations WHERE event_id = $1 AND member_id = $2"
        );

        sqlx::query_as::<_, EventRegistration>(&query)
            .bind(event_id)
            .bind(member_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, event_id: Uuid, member_id: Uuid) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM event_registrations WHERE event_id = $1 AND member_id = $2")
                .bind(event_id)
                .bind(member_id)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_for_event(pool: &PgPool, event_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM event_registrations WHERE event_id = $1 ORDER BY created_at"
        );

        sqlx::query_as::<_, EventRegistration>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }

    pub async fn set_attended(
        pool: &PgPool,
        event_id: Uuid,
        member_id: Uuid,
        attended: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE event_registrations SET attended = $3
            WHERE event_id = $1 AND member_id = $2
            RETURNING {REGISTRATION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, EventRegistration>(&query)
            .bind(event_id)
            .bind(member_id)
            .bind(attended)
            .fetch_optional(pool)
            .await
    }

    pub async fn mark_certificate_issued(
        pool: &PgPool,
        event_id: Uuid,
        member_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE event_registrations SET certificate_issued = TRUE
            WHERE event_id = $1 AND member_id = $2
            "#,
        )
        .bind(event_id)
        .bind(member_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
