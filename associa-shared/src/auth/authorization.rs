/// Role checks
///
/// Two roles exist: `member` and `admin`. Resources owned by a member (profile,
/// payments, certificates) are reachable by that member or by any admin;
/// catalog writes and back-office listings are admin only.
///
/// # Example
///
/// ```
/// use associa_shared::auth::authorization::{require_admin, require_self_or_admin};
/// use associa_shared::auth::middleware::AuthContext;
/// use associa_shared::models::member::MemberRole;
/// use uuid::Uuid;
///
/// let me = AuthContext::new(Uuid::new_v4(), MemberRole::Member);
/// assert!(require_self_or_admin(&me, me.member_id).is_ok());
/// assert!(require_admin(&me).is_err());
/// ```

use uuid::Uuid;

use super::middleware::AuthContext;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Admin role required")]
    AdminRequired,

    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if auth.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::AdminRequired)
    }
}

/// Passes when the caller is the owner of the resource or an admin
pub fn require_self_or_admin(auth: &AuthContext, owner_id: Uuid) -> Result<(), AuthzError> {
    if auth.member_id == owner_id || auth.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}
