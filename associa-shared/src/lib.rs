//! # Associa Shared Library
//!
//! Types, persistence and business rules used by the Associa API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `auth`: Authentication and authorization utilities
//! - `db`: Connection pool and embedded migrations
//! - `membership`: Subscription standing, access gate, credentials and certificates
//! - `storage`: Artifact storage for certificate documents and e-book files

pub mod auth;
pub mod db;
pub mod membership;
pub mod models;
pub mod storage;

/// Current version of the Associa shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
