/// Database plumbing: connection pool and embedded migrations
///
/// Models live in [`crate::models`]; repository adapters over the pool live
/// in [`crate::membership::postgres`].

pub mod migrations;
pub mod pool;
