use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/state", get(handlers::get_state))
        // Module activation
        .route("/modules/:modality/toggle", post(handlers::toggle_module))
        .route("/modules/:modality/dismiss-error", post(handlers::dismiss_error))
        // Video capture
        .route("/video/start", post(handlers::start_video))
        .route("/video/stop", post(handlers::stop_video))
        // Audio conversation
        .route("/audio/record/start", post(handlers::start_recording))
        .route("/audio/record/stop", post(handlers::stop_recording))
        .route("/audio/summary", post(handlers::audio_summary))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
