use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, warn};

use super::container::Container;
use super::controller::ask_controller::REQUEST_ID_HEADER;
use super::controller::{ask, health};
use crate::config::RunMode;

pub fn build_router(container: Arc<Container>) -> Router {
    let cors = create_cors_layer(
        container.mode(),
        container.config().server.cors_allowed_origin.as_deref(),
    );

    let router = Router::new()
        .route("/health", get(health))
        .route("/gemini/ask", post(ask))
        .with_state(container);

    match cors {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

/// CORS policy for browser callers.
///
/// A configured origin is the only one allowed. Without one, development is
/// permissive and production sends no CORS headers at all.
fn create_cors_layer(mode: RunMode, allowed_origin: Option<&str>) -> Option<CorsLayer> {
    let origin = allowed_origin.and_then(|origin| match HeaderValue::from_str(origin) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid CORS_ALLOWED_ORIGIN '{origin}'");
            None
        }
    });

    let cors = match origin {
        Some(origin) => {
            debug!("CORS restricted to {:?}", origin);
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE])
                .expose_headers([REQUEST_ID_HEADER])
        }
        None if mode.is_production() => return None,
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any),
    };

    Some(cors.max_age(Duration::from_secs(3600)))
}
