//! API request handlers.
//!
//! Handlers for the demo service mounted by the `commons-server` binary.

/// Identity, token validation and policy check handlers.
pub mod auth;
/// Health check handler.
pub mod health;
