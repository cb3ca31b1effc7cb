use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::warn;

use crate::{
    AppState,
    publication::StatusSnapshot,
    web::{ApiMessage, process_publish_form, storage},
};

pub const PUBLISHED_MESSAGE: &str = "BIOS update published successfully";
pub const STOPPED_MESSAGE: &str = "BIOS update service stopped";
pub const NOT_PUBLISHED_MESSAGE: &str = "No BIOS update currently published";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/publish", post(publish))
        .route("/stop", post(stop))
        .route("/update", get(check_update))
        .route("/status", get(status))
        .route("/BIN/:name", get(storage::serve_artifact))
}

async fn publish(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<&'static str, (StatusCode, Json<ApiMessage>)> {
    let upload = process_publish_form(multipart, state.upload_dir())
        .await
        .map_err(|err| {
            warn!(status = %err.status(), message = err.message(), "rejected publish request");
            err.into_json()
        })?;

    state
        .commit_and_publish(upload)
        .await
        .map_err(|err| err.into_json())?;

    Ok(PUBLISHED_MESSAGE)
}

async fn stop(State(state): State<AppState>) -> &'static str {
    state.stop().await;
    STOPPED_MESSAGE
}

async fn check_update(State(state): State<AppState>) -> Response {
    match state.update_notice().await {
        Some(notice) => Json(notice).into_response(),
        None => (StatusCode::NOT_FOUND, NOT_PUBLISHED_MESSAGE).into_response(),
    }
}

async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status().await)
}
