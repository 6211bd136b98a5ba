/// Subscription core
///
/// Pure rules first, then the ports and the service that applies them:
///
/// - [`status`]: standing derived from the latest payment
/// - [`gate`]: access-gate state machine for views
/// - [`eligibility`]: consecutive-month streak for certificates
/// - [`credential`]: credential numbering and public validation
/// - [`certificate`]: certificate documents
/// - [`repository`]: storage ports, with [`postgres`] and [`memory`] adapters
/// - [`service`]: [`MembershipService`], the operations exposed over HTTP

pub mod certificate;
pub mod credential;
pub mod eligibility;
pub mod error;
pub mod gate;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod service;
pub mod status;

pub use error::{MembershipError, MembershipResult};
pub use repository::{Repositories, RepositoryError};
pub use service::{MembershipService, PaymentNotification};
