/// Authentication and authorization primitives
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and the signup password policy
/// - [`jwt`]: session token signing and validation (HS256)
/// - [`middleware`]: request principal, token extraction, session cookies
/// - [`authorization`]: member/admin role checks
///
/// # Example
///
/// ```no_run
/// use associa_shared::auth::password::{hash_password, verify_password};
/// use associa_shared::auth::jwt::{create_token, Claims};
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("senha-forte-1")?;
/// assert!(verify_password("senha-forte-1", &hash)?);
///
/// let token = create_token(
///     &Claims::new(Uuid::new_v4(), Duration::days(7)),
///     "a-session-secret-of-at-least-32-bytes",
/// )?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
