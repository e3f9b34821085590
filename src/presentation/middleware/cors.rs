//! CORS Middleware Configuration

use tower_http::cors::{Any, CorsLayer};

/// Create the CORS layer.
///
/// The control plane is consumed by a locally served archive browser; the
/// policy is permissive.
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
