//! HTTP control surface over the session orchestrator
//!
//! - GET /health - Health check
//! - GET /state - Latest dashboard snapshot
//! - POST /modules/{video|audio}/toggle - Switch a modality on or off
//! - POST /modules/{video|audio}/dismiss-error - Clear a modality's error
//! - POST /video/start, /video/stop - Camera capture
//! - POST /audio/record/start, /audio/record/stop - One conversation turn
//! - POST /audio/summary - Recompute the conversation summary

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
