//! # Associa API Server Library
//!
//! HTTP surface of the Associa membership platform.
//!
//! ## Modules
//!
//! - `app`: Application state, session layer and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers
//! - `payments`: Payment processor adapters and webhook verification
//! - `routes`: API route handlers and gated client views

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod payments;
pub mod routes;
