//! # service-commons
//!
//! Startup wiring for [axum](https://docs.rs/axum) services: JWT bearer
//! authentication, claim-based authorization policies, permissive CORS and
//! OpenAPI documentation, plus a token reader that validates a bearer token
//! and returns its claims.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use axum::{routing::get, Router};
//! use commons::setup::{BuildOptions, WebApplicationBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let controllers = Router::new().route("/orders", get(list_orders));
//!
//!     let app = WebApplicationBuilder::from_config_file("commons.toml")?
//!         .with_app_info("orders", env!("CARGO_PKG_VERSION"))
//!         .with_controllers(controllers)
//!         .build_web_application(Some(BuildOptions::default().with_cors(true)))?;
//!
//!     app.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Validating a token by hand
//!
//! ```rust,ignore
//! use commons::{JwtOptions, JwtReader};
//!
//! let reader = JwtReader::new(JwtOptions::new("issuer", "audience", secret));
//! match reader.read_access_token(token) {
//!     Some(validated) => println!("valid until {}", validated.valid_to),
//!     None => println!("rejected"),
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `swagger-ui` | Serve the interactive Swagger UI at `/swagger` in development |
//!
//! ## Modules
//!
//! - [`api`] - OpenAPI documentation and the demo service endpoints
//! - [`auth`] - Token validation/issuance, middleware and policies
//! - [`setup`] - Startup wiring ([`WebApplicationBuilder`])
//! - [`types`] - Claims, token and error types
//! - [`utils`] - Configuration and logging

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// OpenAPI documentation and demo HTTP endpoints.
pub mod api;
/// JWT authentication and authorization.
pub mod auth;
/// Command-line interface of the server binary.
pub mod cli;
/// Startup wiring.
pub mod setup;
/// Core types (claims, tokens, errors).
pub mod types;
/// Configuration and logging utilities.
pub mod utils;

// Re-export commonly used types
pub use auth::jwt::{JwtReader, TokenIssuer, ValidatedToken};
pub use auth::middleware::{require_authenticated, require_policy, Principal};
pub use auth::policy::{AuthorizationPolicies, PERMISSION_CLAIM};
pub use setup::{BuildOptions, SetupError, WebApplication, WebApplicationBuilder};
pub use types::{AppError, ClaimsPrincipal, Result, TokenError, TokenResponse};
pub use utils::toml_config::{AppConfig, ConfigError, Environment, JwtOptions};
