/// Middleware for the API server
///
/// - `security`: security response headers
///
/// Session resolution lives in [`crate::app`] because it needs the
/// application state.

pub mod security;
