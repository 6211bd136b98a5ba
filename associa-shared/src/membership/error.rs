use thiserror::Error;

use super::repository::RepositoryError;
use crate::models::payment::PaymentStatus;
use crate::storage::StorageError;

/// Errors of the subscription core
#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("Member not found")]
    MemberNotFound,

    #[error("Event not found")]
    EventNotFound,

    #[error("Payment not found")]
    PaymentNotFound,

    #[error("Member is not registered for this event")]
    RegistrationNotFound,

    #[error("Member is already registered for this event")]
    AlreadyRegistered,

    #[error("Event is full")]
    EventFull,

    #[error("Attendance not confirmed")]
    NotAttended,

    #[error("Not eligible: {months_completed} consecutive months completed")]
    NotEligible { months_completed: u32 },

    #[error("Certificate already issued")]
    AlreadyIssued,

    #[error("Event certificates are issued through the event")]
    EventRequired,

    #[error("Invalid payment transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Credential error: {0}")]
    Credential(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type MembershipResult<T> = Result<T, MembershipError>;
