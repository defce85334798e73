//! Application startup wiring
//!
//! [`WebApplicationBuilder::build_web_application`] turns configuration,
//! controller routes and OpenAPI fragments into a ready-to-serve
//! [`WebApplication`]:
//!
//! 1. JWT bearer authentication and named authorization policies, when
//!    enabled. Missing `JwtOptions` is a fatal error at this point.
//! 2. The OpenAPI document, with a `Bearer` security scheme when JWT
//!    authentication is enabled.
//! 3. The middleware pipeline, outermost first: request tracing, CORS
//!    (optional), authentication/authorization (optional), documentation
//!    routes, controllers.
//!
//! ```ignore
//! use commons::setup::{BuildOptions, WebApplicationBuilder};
//!
//! let app = WebApplicationBuilder::from_config_file("commons.toml")?
//!     .with_app_info("orders", "1.0.0")
//!     .with_controllers(controllers)
//!     .with_api_doc(ApiDoc::openapi())
//!     .build_web_application(Some(BuildOptions::default().with_policy("Admin")))?;
//! app.run().await?;
//! ```

/// CORS and exception-handling layers.
pub mod layers;

use crate::api::docs;
use crate::auth::{jwt::JwtReader, middleware::authenticate, policy::AuthorizationPolicies};
use crate::utils::toml_config::{AppConfig, ConfigError, Environment, JwtOptions};
use axum::{middleware, Extension, Router};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::openapi::OpenApi;

/// Options chosen by the caller before startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Register JWT bearer authentication and authorization
    pub use_jwt_authentication: bool,
    /// Register permissive CORS
    pub use_cors: bool,
    /// Policy names; each requires a `Permission` claim equal to its name
    pub authentication_policies: Vec<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            use_jwt_authentication: true,
            use_cors: false,
            authentication_policies: Vec::new(),
        }
    }
}

impl BuildOptions {
    pub fn with_jwt_authentication(mut self, enabled: bool) -> Self {
        self.use_jwt_authentication = enabled;
        self
    }

    pub fn with_cors(mut self, enabled: bool) -> Self {
        self.use_cors = enabled;
        self
    }

    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.authentication_policies.push(policy.into());
        self
    }

    pub fn with_policies<I, P>(mut self, policies: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.authentication_policies
            .extend(policies.into_iter().map(Into::into));
        self
    }
}

/// Startup failures. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("JwtOptions configuration section is required when JWT authentication is enabled")]
    MissingJwtOptions,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to serialize OpenAPI document: {0}")]
    ApiDoc(#[from] serde_json::Error),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// Collects what the application is built from.
pub struct WebApplicationBuilder {
    configuration: AppConfig,
    app_name: String,
    app_version: String,
    controllers: Router,
    api_doc: Vec<OpenApi>,
}

impl WebApplicationBuilder {
    pub fn new(configuration: AppConfig) -> Self {
        Self {
            configuration,
            app_name: env!("CARGO_PKG_NAME").to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            controllers: Router::new(),
            api_doc: Vec::new(),
        }
    }

    /// Load configuration from a TOML file (plus environment overrides).
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        AppConfig::load(path).map(Self::new)
    }

    pub fn configuration(&self) -> &AppConfig {
        &self.configuration
    }

    /// Name and version shown in logs and in the OpenAPI document.
    pub fn with_app_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.app_name = name.into();
        self.app_version = version.into();
        self
    }

    /// Merge controller routes. Can be called several times.
    pub fn with_controllers(mut self, controllers: Router) -> Self {
        self.controllers = self.controllers.merge(controllers);
        self
    }

    /// Add an OpenAPI fragment, typically `ApiDoc::openapi()`.
    pub fn with_api_doc(mut self, fragment: OpenApi) -> Self {
        self.api_doc.push(fragment);
        self
    }

    /// Wire authentication, documentation and middleware into a
    /// [`WebApplication`]. `None` uses [`BuildOptions::default`].
    pub fn build_web_application(
        self,
        build_options: Option<BuildOptions>,
    ) -> Result<WebApplication, SetupError> {
        let build_options = build_options.unwrap_or_default();
        let environment = self.configuration.server.environment;

        let authentication = configure_jwt_authentication(&self.configuration, &build_options)?;

        // Shared reader for handlers; available whenever JwtOptions exist
        let jwt_reader = match &authentication {
            Some(auth) => Some(auth.reader.clone()),
            None => self
                .configuration
                .jwt_options
                .clone()
                .map(|options| Arc::new(JwtReader::new(options))),
        };

        let api_doc = docs::build_document(
            &self.app_name,
            &self.app_version,
            self.api_doc,
            build_options.use_jwt_authentication,
        );

        log_application_startup(&self.app_name, &self.app_version, environment);

        let router = self
            .controllers
            .merge(docs::routes(&api_doc, environment.is_development())?);
        let router = configure_middlewares(
            router,
            &build_options,
            environment,
            authentication,
            jwt_reader.clone(),
        );

        Ok(WebApplication {
            router,
            address: self.configuration.bind_address(),
            environment,
            jwt_reader,
            api_doc,
        })
    }
}

/// Services registered when JWT authentication is enabled.
struct Authentication {
    reader: Arc<JwtReader>,
    policies: Arc<AuthorizationPolicies>,
}

fn configure_jwt_authentication(
    configuration: &AppConfig,
    build_options: &BuildOptions,
) -> Result<Option<Authentication>, SetupError> {
    if !build_options.use_jwt_authentication {
        return Ok(None);
    }

    let options: &JwtOptions = configuration
        .jwt_options
        .as_ref()
        .ok_or(SetupError::MissingJwtOptions)?;
    options.validate()?;

    let policies = AuthorizationPolicies::new(build_options.authentication_policies.iter().cloned());
    if !policies.is_empty() {
        info!(
            policies = ?policies.names().collect::<Vec<_>>(),
            "Registered authorization policies"
        );
    }

    Ok(Some(Authentication {
        reader: Arc::new(JwtReader::new(options.clone())),
        policies: Arc::new(policies),
    }))
}

fn log_application_startup(app_name: &str, app_version: &str, environment: Environment) {
    info!(%environment, "Starting {} v{}", app_name, app_version);

    if environment.is_development() {
        info!("Use development exception page.");
    }

    info!("Use Swagger.");
}

/// Layers are applied innermost first, so the last one added sees the
/// request first.
fn configure_middlewares(
    router: Router,
    build_options: &BuildOptions,
    environment: Environment,
    authentication: Option<Authentication>,
    jwt_reader: Option<Arc<JwtReader>>,
) -> Router {
    let mut router = router;

    if let Some(reader) = jwt_reader {
        router = router.layer(Extension(reader));
    }

    if let Some(auth) = authentication {
        router = router
            .layer(middleware::from_fn_with_state(auth.reader, authenticate))
            .layer(Extension(auth.policies));
    }

    if build_options.use_cors {
        router = router.layer(layers::permissive_cors());
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(layers::exception_layer(environment.is_development()))
}

/// A fully wired application.
pub struct WebApplication {
    router: Router,
    address: String,
    environment: Environment,
    jwt_reader: Option<Arc<JwtReader>>,
    api_doc: OpenApi,
}

impl WebApplication {
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    /// Address the application binds to in [`run`](Self::run).
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// The shared token reader, when `JwtOptions` are configured.
    pub fn jwt_reader(&self) -> Option<Arc<JwtReader>> {
        self.jwt_reader.clone()
    }

    pub fn api_doc(&self) -> &OpenApi {
        &self.api_doc
    }

    /// Bind and serve until Ctrl+C.
    pub async fn run(self) -> Result<(), SetupError> {
        let listener = TcpListener::bind(&self.address)
            .await
            .map_err(|source| SetupError::Bind {
                address: self.address.clone(),
                source,
            })?;

        info!(address = %self.address, "Listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(SetupError::Serve)
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
