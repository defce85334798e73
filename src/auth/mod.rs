//! JWT Authentication and Authorization
//!
//! This module validates bearer tokens, issues tokens, and provides the
//! Axum middleware that authenticates requests and enforces named
//! authorization policies.
//!
//! # Module Structure
//!
//! - [`auth::jwt`](crate::auth::jwt) - token validation ([`JwtReader`](crate::auth::jwt::JwtReader)) and issuance
//! - [`auth::middleware`](crate::auth::middleware) - authentication middleware, extractors and route guards
//! - [`auth::policy`](crate::auth::policy) - named policies backed by the `Permission` claim
//!
//! # Validation Rules
//!
//! A token is accepted when it is signed with the configured symmetric key
//! (HS256, HS384 or HS512), its `iss` and `aud` match the configured
//! values, and its `exp`/`nbf` window contains the current time within the
//! configured clock skew.
//!
//! # Usage
//!
//! ## Reading a token directly
//!
//! ```ignore
//! use commons::auth::jwt::JwtReader;
//!
//! let reader = JwtReader::new(jwt_options);
//! if let Some(token) = reader.read_access_token(raw) {
//!     println!("{:?} valid until {}", token.claims.subject(), token.valid_to);
//! }
//! ```
//!
//! ## Guarding routes
//!
//! ```ignore
//! use axum::{middleware, routing::get, Router};
//! use commons::auth::middleware::{require_authenticated, require_policy, Principal};
//!
//! async fn whoami(principal: Principal) -> String {
//!     principal.claims.subject().unwrap_or_default().to_string()
//! }
//!
//! let controllers = Router::new()
//!     .route("/me", get(whoami).route_layer(middleware::from_fn(require_authenticated)))
//!     .route("/admin", get(admin).route_layer(require_policy("Admin")));
//! ```

/// Token validation and issuance.
pub mod jwt;
/// Authentication middleware, extractors and route guards.
pub mod middleware;
/// Named authorization policies.
pub mod policy;
