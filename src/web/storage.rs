use std::io::ErrorKind;

use anyhow::Context;
use axum::{
    extract::{Path as AxumPath, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::web::{AppState, internal_error, uploads::is_valid_artifact_name};

/// `GET /BIN/:name`: streams a stored image from the upload directory.
///
/// Only names that could have been uploaded are served, so the route never
/// escapes the upload directory.
pub async fn serve_artifact(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> Response {
    if !is_valid_artifact_name(&name) {
        warn!(%name, "rejected artifact request with invalid name");
        return (StatusCode::BAD_REQUEST, "Invalid file name").into_response();
    }

    let path = state.upload_dir().join(&name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return (StatusCode::NOT_FOUND, "File not found").into_response();
        }
        Err(err) => {
            let err = anyhow::Error::new(err)
                .context(format!("failed to read artifact {}", path.display()));
            return internal_error(err).into_response();
        }
    };

    match attachment_headers(&name) {
        Ok(headers) => (headers, bytes).into_response(),
        Err(err) => internal_error(err).into_response(),
    }
}

fn attachment_headers(name: &str) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime::APPLICATION_OCTET_STREAM.as_ref())
            .context("invalid content type")?,
    );
    let disposition = HeaderValue::from_str(&format!(r#"attachment; filename="{name}""#))
        .context("artifact name is not a valid header value")?;
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok(headers)
}
