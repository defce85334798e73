//! OpenAPI document assembly and the routes that serve it.

use axum::{http::header::CONTENT_TYPE, routing::get, Router};
use utoipa::openapi::{
    security::{ApiKey, ApiKeyValue, SecurityRequirement, SecurityScheme},
    InfoBuilder, OpenApi, OpenApiBuilder,
};

/// Path of the generated OpenAPI document.
pub const OPENAPI_JSON_PATH: &str = "/swagger/v1/swagger.json";

/// Route prefix of the interactive documentation UI.
pub const SWAGGER_UI_PATH: &str = "/swagger";

/// Name of the bearer security scheme in the document.
pub const BEARER_SCHEME: &str = "Bearer";

const BEARER_DESCRIPTION: &str = "JWT Authorization header using the Bearer scheme. \r\n\r\n\
Enter 'Bearer' [space] and then your token in the text input below.\r\n\r\n\
Example: \"Bearer 12345abcdef\"";

/// Builds the service document: `title`/`version` as info, every fragment
/// merged in, and the bearer scheme when `include_bearer` is set.
pub fn build_document(
    title: &str,
    version: &str,
    fragments: impl IntoIterator<Item = OpenApi>,
    include_bearer: bool,
) -> OpenApi {
    let info = InfoBuilder::new().title(title).version(version).build();
    let mut document = OpenApiBuilder::new().info(info).build();

    for fragment in fragments {
        document.merge(fragment);
    }

    if include_bearer {
        add_bearer_security(&mut document);
    }

    document
}

/// Declares the `Bearer` scheme (an `Authorization` header) and requires it
/// for every operation.
pub fn add_bearer_security(document: &mut OpenApi) {
    document
        .components
        .get_or_insert_with(Default::default)
        .add_security_scheme(
            BEARER_SCHEME,
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                "Authorization",
                BEARER_DESCRIPTION,
            ))),
        );

    document
        .security
        .get_or_insert_with(Vec::new)
        .push(SecurityRequirement::new(BEARER_SCHEME, Vec::<String>::new()));
}

/// Routes serving the document, plus the UI when `serve_ui` is set.
pub fn routes(document: &OpenApi, serve_ui: bool) -> Result<Router, serde_json::Error> {
    let body = document.to_pretty_json()?;

    let router = Router::new().route(
        OPENAPI_JSON_PATH,
        get(move || {
            let body = body.clone();
            async move { ([(CONTENT_TYPE, "application/json")], body) }
        }),
    );

    Ok(attach_ui(router, serve_ui))
}

#[cfg(feature = "swagger-ui")]
fn attach_ui(router: Router, serve_ui: bool) -> Router {
    use utoipa_swagger_ui::{Config, SwaggerUi};

    if !serve_ui {
        return router;
    }
    router.merge(SwaggerUi::new(SWAGGER_UI_PATH).config(Config::from(OPENAPI_JSON_PATH)))
}

#[cfg(not(feature = "swagger-ui"))]
fn attach_ui(router: Router, serve_ui: bool) -> Router {
    if serve_ui {
        tracing::debug!("swagger-ui feature is disabled; only the JSON document is served");
    }
    router
}
