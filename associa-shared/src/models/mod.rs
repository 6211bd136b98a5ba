/// Database models
///
/// Each model carries its own CRUD operations as associated functions taking a
/// `&PgPool`.
///
/// # Models
///
/// - `member`: association members, roles and cached subscription status
/// - `payment`: billing attempts (monthly / annual plans)
/// - `credential`: digital membership cards
/// - `certificate`: issued certificates (write-once)
/// - `event`: events and registrations
/// - `ebook`: e-book catalog
/// - `benefit`: partner benefits directory
///
/// # Example
///
/// ```no_run
/// use associa_shared::models::payment::Payment;
/// use associa_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(member_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let latest = Payment::latest_for_member(&pool, member_id).await?;
/// # Ok(())
/// # }
/// ```

pub mod benefit;
pub mod certificate;
pub mod credential;
pub mod ebook;
pub mod event;
pub mod member;
pub mod payment;
