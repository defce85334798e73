use crate::types::AppError;
use axum::response::{IntoResponse, Response};
use std::any::Any;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
};
use tracing::error;

/// Permissive CORS: any method, any header and any origin, with
/// credentials allowed. Origins, methods and headers are mirrored from the
/// request because a literal `*` cannot be combined with credentials.
pub fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
}

/// Turns handler panics into 500 responses. With `detailed` set (the
/// development environment) the panic message is returned to the client.
pub fn exception_layer(
    detailed: bool,
) -> CatchPanicLayer<impl FnMut(Box<dyn Any + Send + 'static>) -> Response + Clone> {
    CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
        panic_response(panic, detailed)
    })
}

fn panic_response(panic: Box<dyn Any + Send + 'static>, detailed: bool) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    error!(panic = %message, "request handler panicked");

    let body = if detailed {
        format!("Unhandled panic: {message}")
    } else {
        "An unexpected error occurred".to_string()
    };
    AppError::Internal(body).into_response()
}
