use super::state::AppState;
use crate::error::{CommandError, ModalityError};
use crate::modality::Modality;
use crate::session::{Command, DashboardSnapshot};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// Run one command and answer with the resulting snapshot
async fn dispatch(state: &AppState, command: Command) -> Response {
    match state.orchestrator.execute(command).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(CommandError::Rejected(e)) => {
            warn!("{:?} rejected: {}", command, e);
            let status = match e {
                ModalityError::Inactive(_) => StatusCode::CONFLICT,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            error_response(status, e.to_string())
        }
        Err(CommandError::Closed(e)) => {
            error!("{:?} failed: {}", command, e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// GET /state
/// Latest published dashboard state
pub async fn get_state(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.orchestrator.latest())
}

/// POST /modules/:modality/toggle
pub async fn toggle_module(
    State(state): State<AppState>,
    Path(modality): Path<Modality>,
) -> Response {
    let command = match modality {
        Modality::Video => Command::ToggleVideo,
        Modality::Audio => Command::ToggleAudio,
    };
    dispatch(&state, command).await
}

/// POST /modules/:modality/dismiss-error
pub async fn dismiss_error(
    State(state): State<AppState>,
    Path(modality): Path<Modality>,
) -> Response {
    dispatch(&state, Command::DismissError(modality)).await
}

/// POST /video/start
pub async fn start_video(State(state): State<AppState>) -> Response {
    dispatch(&state, Command::StartVideo).await
}

/// POST /video/stop
pub async fn stop_video(State(state): State<AppState>) -> Response {
    dispatch(&state, Command::StopVideo).await
}

/// POST /audio/record/start
pub async fn start_recording(State(state): State<AppState>) -> Response {
    dispatch(&state, Command::StartRecording).await
}

/// POST /audio/record/stop
/// The upload happens asynchronously; poll /state for the reply
pub async fn stop_recording(State(state): State<AppState>) -> Response {
    dispatch(&state, Command::StopRecording).await
}

/// POST /audio/summary
pub async fn audio_summary(State(state): State<AppState>) -> Response {
    dispatch(&state, Command::ComputeAudioSummary).await
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.orchestrator.is_closed() {
        (StatusCode::SERVICE_UNAVAILABLE, "orchestrator stopped")
    } else {
        (StatusCode::OK, "OK")
    }
}
