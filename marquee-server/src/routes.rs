use axum::{Router, http::HeaderValue, routing::get};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{health::health_handler, hero::get_hero_pool};
use crate::infra::{app_state::AppState, config::CorsConfig};

pub fn create_app(state: AppState) -> Router {
    let cors_layer = cors_layer(&state.config().cors);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/hero/{kind}", get(get_hero_pool))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET])
}
