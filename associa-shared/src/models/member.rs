/// Member model and database operations
///
/// A member is a person registered with the association: identity, contact data,
/// occupation, password credential, role and the cached subscription status.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE member_role AS ENUM ('member', 'admin');
/// CREATE TYPE subscription_status AS ENUM ('pending', 'active', 'inactive');
///
/// CREATE TABLE members (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     email CITEXT NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     phone VARCHAR(32),
///     cpf VARCHAR(14) NOT NULL UNIQUE,
///     occupation VARCHAR(255),
///     graduated BOOLEAN NOT NULL DEFAULT FALSE,
///     role member_role NOT NULL DEFAULT 'member',
///     subscription_status subscription_status NOT NULL DEFAULT 'pending',
///     photo_url VARCHAR(512),
///     cancelled_at TIMESTAMPTZ,
///     last_login_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use associa_shared::models::member::{CreateMember, Member, MemberRole};
/// use associa_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let member = Member::create(&pool, CreateMember {
///     name: "Maria Souza".to_string(),
///     email: "maria@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     phone: None,
///     cpf: "123.456.789-00".to_string(),
///     occupation: Some("Psicanalista".to_string()),
///     graduated: true,
///     role: MemberRole::Member,
/// }).await?;
///
/// let found = Member::find_by_email(&pool, "maria@example.com").await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Columns selected for every member query
const MEMBER_COLUMNS: &str = "id, name, email, password_hash, phone, cpf, occupation, graduated, \
     role, subscription_status, photo_url, cancelled_at, last_login_at, created_at, updated_at";

/// Member roles
///
/// Closed set: every permission check matches on it exhaustively so a new role
/// cannot slip through a string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Regular association member
    Member,

    /// Back-office staff
    Admin,
}

impl MemberRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Member => "member",
            MemberRole::Admin => "admin",
        }
    }

    /// Whether this role may use the admin back-office
    pub fn is_admin(&self) -> bool {
        match self {
            MemberRole::Admin => true,
            MemberRole::Member => false,
        }
    }
}

/// Cached subscription status stored on the member row
///
/// This is a cache of the derivation done by
/// [`crate::membership::status::resolve`]; the payment ledger is the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Registered, never paid
    Pending,

    /// Current on payments
    Active,

    /// Lapsed or cancelled
    Inactive,
}

/// Member model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    /// Unique member ID (UUID v4)
    pub id: Uuid,

    /// Full name
    pub name: String,

    /// Email address (case-insensitive via CITEXT, unique)
    pub email: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Contact phone
    pub phone: Option<String>,

    /// Brazilian national id (CPF), unique
    pub cpf: String,

    /// Occupation shown on the credential
    pub occupation: Option<String>,

    /// Whether the member declared a completed degree
    pub graduated: bool,

    /// Role
    pub role: MemberRole,

    /// Cached subscription status
    pub subscription_status: SubscriptionStatus,

    /// Profile photo reference
    pub photo_url: Option<String>,

    /// When the membership was cancelled (None while the membership stands)
    pub cancelled_at: Option<DateTime<Utc>>,

    /// When the member last logged in
    pub last_login_at: Option<DateTime<Utc>>,

    /// Enrollment date
    pub created_at: DateTime<Utc>,

    /// Last update
    pub updated_at: DateTime<Utc>,
}

impl Member {
    /// Whether the membership was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }
}

/// Validates a CPF and formats it as `000.000.000-00`
///
/// Punctuation is ignored. Returns `None` when the input does not have eleven
/// digits, repeats a single digit, or fails either check digit.
pub fn normalize_cpf(input: &str) -> Option<String> {
    let digits: Vec<u32> = input
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | ' '))
        .map(|c| c.to_digit(10))
        .collect::<Option<_>>()?;

    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return None;
    }

    if cpf_check_digit(&digits[..9]) != digits[9] || cpf_check_digit(&digits[..10]) != digits[10] {
        return None;
    }

    let text: String = digits.iter().filter_map(|d| char::from_digit(*d, 10)).collect();
    Some(format!(
        "{}.{}.{}-{}",
        &text[0..3],
        &text[3..6],
        &text[6..9],
        &text[9..11]
    ))
}

/// Modulo-11 check digit over the preceding digits
pub fn cpf_check_digit(digits: &[u32]) -> u32 {
    let weight = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (weight - i as u32))
        .sum();
    match (sum * 10) % 11 {
        10 => 0,
        r => r,
    }
}

/// Input for creating a new member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMember {
    pub name: String,
    pub email: String,
    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,
    pub phone: Option<String>,
    pub cpf: String,
    pub occupation: Option<String>,
    pub graduated: bool,
    pub role: MemberRole,
}

/// Input for updating an existing member
///
/// All fields are optional. Only non-None fields will be updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMember {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,

    /// New phone (use Some(None) to clear)
    pub phone: Option<Option<String>>,

    pub cpf: Option<String>,

    /// New occupation (use Some(None) to clear)
    pub occupation: Option<Option<String>>,

    pub graduated: Option<bool>,
    pub role: Option<MemberRole>,

    /// New photo reference (use Some(None) to clear)
    pub photo_url: Option<Option<String>>,
}

impl UpdateMember {
    /// Applies the update to an in-memory member
    pub fn apply_to(self, member: &mut Member) {
        if let Some(name) = self.name {
            member.name = name;
        }
        if let Some(email) = self.email {
            member.email = email;
        }
        if let Some(password_hash) = self.password_hash {
            member.password_hash = password_hash;
        }
        if let Some(phone) = self.phone {
            member.phone = phone;
        }
        if let Some(cpf) = self.cpf {
            member.cpf = cpf;
        }
        if let Some(occupation) = self.occupation {
            member.occupation = occupation;
        }
        if let Some(graduated) = self.graduated {
            member.graduated = graduated;
        }
        if let Some(role) = self.role {
            member.role = role;
        }
        if let Some(photo_url) = self.photo_url {
            member.photo_url = photo_url;
        }
        member.updated_at = Utc::now();
    }
}

impl Member {
    /// Creates a new member
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Email or CPF already exists (unique constraint violation)
    /// - Database connection fails
    pub async fn create(pool: &PgPool, data: CreateMember) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO members (name, email, password_hash, phone, cpf, occupation, graduated, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {MEMBER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Member>(&query)
            .bind(data.name)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.phone)
            .bind(data.cpf)
            .bind(data.occupation)
            .bind(data.graduated)
            .bind(data.role)
            .fetch_one(pool)
            .await
    }

    /// Finds a member by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = $1");

        sqlx::query_as::<_, Member>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a member by email address (case-insensitive via CITEXT)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE email = $1");

        sqlx::query_as::<_, Member>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Updates an existing member
    ///
    /// Only non-None fields in `data` will be updated. The `updated_at` timestamp
    /// is automatically set to the current time.
    ///
    /// # Returns
    ///
    /// The updated member if found, None if the member doesn't exist
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use associa_shared::models::member::{Member, UpdateMember};
    /// # use sqlx::PgPool;
    /// # use uuid::Uuid;
    /// # async fn example(pool: PgPool, member_id: Uuid) -> Result<(), sqlx::Error> {
    /// let update = UpdateMember {
    ///     occupation: Some(Some("Psicólogo".to_string())),
    ///     graduated: Some(true),
    ///     ..Default::default()
    /// };
    ///
    /// if let Some(member) = Member::update(&pool, member_id, update).await? {
    ///     println!("Updated member: {}", member.email);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateMember,
    ) -> Result<Option<Self>, sqlx::Error> {
        // Build dynamic update query based on which fields are present
        let mut query = String::from("UPDATE members SET updated_at = NOW()");
        let mut bind_count = 1;

        let mut push = |column: &str, present: bool, query: &mut String| {
            if present {
                bind_count += 1;
                query.push_str(&format!(", {} = ${}", column, bind_count));
            }
        };

        push("name", data.name.is_some(), &mut query);
        push("email", data.email.is_some(), &mut query);
        push("password_hash", data.password_hash.is_some(), &mut query);
        push("phone", data.phone.is_some(), &mut query);
        push("cpf", data.cpf.is_some(), &mut query);
        push("occupation", data.occupation.is_some(), &mut query);
        push("graduated", data.graduated.is_some(), &mut query);
        push("role", data.role.is_some(), &mut query);
        push("photo_url", data.photo_url.is_some(), &mut query);

        query.push_str(&format!(" WHERE id = $1 RETURNING {MEMBER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Member>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(email) = data.email {
            q = q.bind(email);
        }
        if let Some(password_hash) = data.password_hash {
            q = q.bind(password_hash);
        }
        if let Some(phone) = data.phone {
            q = q.bind(phone);
        }
        if let Some(cpf) = data.cpf {
            q = q.bind(cpf);
        }
        if let Some(occupation) = data.occupation {
            q = q.bind(occupation);
        }
        if let Some(graduated) = data.graduated {
            q = q.bind(graduated);
        }
        if let Some(role) = data.role {
            q = q.bind(role);
        }
        if let Some(photo_url) = data.photo_url {
            q = q.bind(photo_url);
        }

        q.fetch_optional(pool).await
    }

    /// Stores the derived subscription status
    ///
    /// Returns true if the member exists.
    pub async fn set_subscription_status(
        pool: &PgPool,
        id: Uuid,
        status: SubscriptionStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE members SET subscription_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks (Some) or clears (None) the membership cancellation
    pub async fn set_cancelled_at(
        pool: &PgPool,
        id: Uuid,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE members SET cancelled_at = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(cancelled_at)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a member by ID
    ///
    /// ⚠️  Payments, credentials, registrations and certificates cascade.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Updates the last login timestamp for a member
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE members SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists members with pagination, newest first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {MEMBER_COLUMNS} FROM members ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );

        sqlx::query_as::<_, Member>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Counts total number of members
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM members")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
