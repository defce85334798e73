//! HTTP API Documentation, Handlers and Routes
//!
//! # Module Structure
//!
//! - [`api::docs`](crate::api::docs) - OpenAPI document assembly and serving
//! - [`api::handlers`](crate::api::handlers) - Request handlers of the demo service
//! - [`api::routes`](crate::api::routes) - Route definitions for the demo service
//!
//! # Demo Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/whoami` - Claims of the authenticated caller
//! - `POST /api/tokens/validate` - Validate a token with the shared reader
//! - `GET /api/policies/{policy}` - Succeeds when the caller satisfies the policy
//!
//! # OpenAPI Documentation
//!
//! The document is served at `/swagger/v1/swagger.json`. In the development
//! environment, with the `swagger-ui` feature enabled, interactive
//! documentation is available at `/swagger/`.

use crate::api::handlers::{auth, health};
use crate::types::TokenResponse;
use utoipa::OpenApi;

/// OpenAPI document generation.
pub mod docs;
/// Request and response handlers for the demo endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

/// OpenAPI fragment describing the demo endpoints.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::whoami,
        auth::validate_token,
        auth::check_policy,
    ),
    components(schemas(
        health::HealthResponse,
        auth::WhoAmIResponse,
        auth::ValidateTokenRequest,
        auth::ValidateTokenResponse,
        auth::PolicyCheckResponse,
        TokenResponse,
    )),
    tags(
        (name = "auth", description = "Identity and token inspection"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
