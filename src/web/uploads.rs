use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::{
    Json,
    extract::{Multipart, multipart::MultipartError},
    http::StatusCode,
};
use sanitize_filename::OptionsForCheck as SanitizeOptions;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::warn;
use uuid::Uuid;

use crate::web::{ApiMessage, json_error};

pub const VERSION_FIELD: &str = "version";
pub const FILE_FIELD: &str = "file";

const MAX_NAME_LEN: usize = 255;
const STAGING_SUFFIX: &str = ".part";
pub const STORAGE_FAILED: &str = "Failed to store the uploaded file";
pub const TOO_LARGE_MESSAGE: &str = "Uploaded file exceeds the configured size limit";

/// Result type used by the upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when validating or persisting an uploaded image.
#[derive(Debug)]
pub struct UploadError {
    status: StatusCode,
    message: String,
}

impl UploadError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_json(self) -> (StatusCode, Json<ApiMessage>) {
        json_error(self.status, self.message)
    }

    fn from_multipart(err: MultipartError, context: &str) -> Self {
        let status = err.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::new(status, TOO_LARGE_MESSAGE);
        }
        Self::new(status, format!("{context}: {}", err.body_text()))
    }
}

/// A fully received image waiting to be moved under its published name.
#[derive(Debug)]
pub struct StagedUpload {
    pub version: String,
    pub original_name: String,
    pub staged_path: PathBuf,
    pub file_size: u64,
}

impl StagedUpload {
    /// Renames the staged bytes to `dest_dir/<original name>`, replacing any file of that name.
    pub async fn commit(self, dest_dir: &Path) -> UploadResult<PathBuf> {
        let final_path = dest_dir.join(&self.original_name);
        if let Err(err) = tokio::fs::rename(&self.staged_path, &final_path).await {
            warn!(?err, file = %final_path.display(), "failed to move staged upload into place");
            remove_staged(&self.staged_path).await;
            return Err(UploadError::storage(STORAGE_FAILED));
        }
        Ok(final_path)
    }
}

/// Ensures the destination directory exists.
pub async fn ensure_directory(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("failed to create upload directory {}", path.display()))
}

/// Whether `name` may be stored in, and served from, the upload directory.
///
/// Accepts a single path component made of ASCII letters, digits and `._-+`, with no
/// leading dot. Windows device names are refused on every platform. Staging files start
/// with a dot and are therefore never served.
pub fn is_valid_artifact_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'))
        && sanitize_filename::is_sanitized_with_options(
            name,
            SanitizeOptions {
                windows: true,
                ..Default::default()
            },
        )
}

/// Parses the publish form, streaming the image into a staging file under `dest_dir`.
///
/// Nothing is left on disk when this returns an error.
pub async fn process_publish_form(
    mut multipart: Multipart,
    dest_dir: &Path,
) -> UploadResult<StagedUpload> {
    let mut form = PublishForm::default();

    if let Err(err) = form.read(&mut multipart, dest_dir).await {
        form.discard().await;
        return Err(err);
    }

    let version = form.version.take().map(|v| v.trim().to_string());
    let Some(version) = version.filter(|v| !v.is_empty()) else {
        form.discard().await;
        return Err(UploadError::bad_request("Missing required field `version`"));
    };

    let Some(file) = form.file.take() else {
        return Err(UploadError::bad_request("Missing required field `file`"));
    };

    Ok(StagedUpload {
        version,
        original_name: file.original_name,
        staged_path: file.path,
        file_size: file.size,
    })
}

#[derive(Debug)]
struct StagedFile {
    original_name: String,
    path: PathBuf,
    size: u64,
}

#[derive(Debug, Default)]
struct PublishForm {
    version: Option<String>,
    file: Option<StagedFile>,
}

impl PublishForm {
    async fn read(&mut self, multipart: &mut Multipart, dest_dir: &Path) -> UploadResult<()> {
        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|err| UploadError::from_multipart(err, "Malformed upload form"))?
        {
            let field_name = field.name().unwrap_or("").to_string();

            match field_name.as_str() {
                VERSION_FIELD => {
                    let value = field.text().await.map_err(|err| {
                        UploadError::from_multipart(err, "Failed to read field `version`")
                    })?;
                    self.version = Some(value);
                }
                FILE_FIELD => {
                    if self.file.is_some() {
                        return Err(UploadError::bad_request("Only one file may be published"));
                    }

                    let Some(original_name) = field.file_name().map(str::to_string) else {
                        return Err(UploadError::bad_request(
                            "Field `file` must be a file upload",
                        ));
                    };
                    if !is_valid_artifact_name(&original_name) {
                        return Err(UploadError::bad_request(format!(
                            "Invalid file name `{original_name}`"
                        )));
                    }

                    let path = dest_dir.join(format!(".{}{STAGING_SUFFIX}", Uuid::new_v4()));
                    let mut file = File::create(&path).await.map_err(|err| {
                        warn!(?err, file = %path.display(), "failed to create staging file");
                        UploadError::storage(STORAGE_FAILED)
                    })?;
                    // Registered before streaming so a failed read still cleans it up.
                    self.file = Some(StagedFile {
                        original_name,
                        path: path.clone(),
                        size: 0,
                    });

                    let mut total_bytes: u64 = 0;
                    while let Some(chunk) = field
                        .chunk()
                        .await
                        .map_err(|err| UploadError::from_multipart(err, "Failed to read uploaded data"))?
                    {
                        total_bytes += chunk.len() as u64;
                        file.write_all(&chunk).await.map_err(|err| {
                            warn!(?err, file = %path.display(), "failed to write upload chunk");
                            UploadError::storage(STORAGE_FAILED)
                        })?;
                    }
                    file.flush().await.map_err(|err| {
                        warn!(?err, file = %path.display(), "failed to flush staging file");
                        UploadError::storage(STORAGE_FAILED)
                    })?;

                    if let Some(staged) = self.file.as_mut() {
                        staged.size = total_bytes;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    async fn discard(&mut self) {
        if let Some(file) = self.file.take() {
            remove_staged(&file.path).await;
        }
    }
}

async fn remove_staged(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(?err, file = %path.display(), "failed to remove staging file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn accepts_plain_image_names() {
        assert!(is_valid_artifact_name("bios.bin"));
        assert!(is_valid_artifact_name("X570_AORUS-F37c+patch.CAP"));
        assert!(is_valid_artifact_name("firmware"));
    }

    #[test]
    fn rejects_traversal_and_hidden_names() {
        assert!(!is_valid_artifact_name(""));
        assert!(!is_valid_artifact_name("."));
        assert!(!is_valid_artifact_name(".."));
        assert!(!is_valid_artifact_name("../etc/passwd"));
        assert!(!is_valid_artifact_name("..\\boot.ini"));
        assert!(!is_valid_artifact_name("sub/bios.bin"));
        assert!(!is_valid_artifact_name(".hidden.bin"));
        assert!(!is_valid_artifact_name(".0c1e.part"));
    }

    #[test]
    fn rejects_unusual_characters_and_reserved_names() {
        assert!(!is_valid_artifact_name("bios image.bin"));
        assert!(!is_valid_artifact_name("bios%2e.bin"));
        assert!(!is_valid_artifact_name("固件.bin"));
        assert!(!is_valid_artifact_name("CON"));
        assert!(!is_valid_artifact_name("nul.bin"));
        assert!(!is_valid_artifact_name("LPT1"));
        assert!(!is_valid_artifact_name(&"a".repeat(MAX_NAME_LEN + 1)));
    }

    #[tokio::test]
    async fn commit_replaces_existing_file() {
        let dir = tempdir().expect("temp dir");
        let existing = dir.path().join("bios.bin");
        tokio::fs::write(&existing, b"old").await.unwrap();
        let staged_path = dir.path().join(".staged.part");
        tokio::fs::write(&staged_path, b"new image").await.unwrap();

        let staged = StagedUpload {
            version: "2.0".to_string(),
            original_name: "bios.bin".to_string(),
            staged_path: staged_path.clone(),
            file_size: 9,
        };
        let stored = staged.commit(dir.path()).await.expect("commit");

        assert_eq!(stored, existing);
        assert_eq!(tokio::fs::read(&stored).await.unwrap(), b"new image");
        assert!(!staged_path.exists());
    }

    #[tokio::test]
    async fn failed_commit_removes_staging_file() {
        let dir = tempdir().expect("temp dir");
        let staged_path = dir.path().join(".staged.part");
        tokio::fs::write(&staged_path, b"image").await.unwrap();

        let staged = StagedUpload {
            version: "1.0".to_string(),
            original_name: "bios.bin".to_string(),
            staged_path: staged_path.clone(),
            file_size: 5,
        };
        let err = staged
            .commit(&dir.path().join("removed"))
            .await
            .expect_err("commit into missing directory");

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), STORAGE_FAILED);
        assert!(!staged_path.exists());
    }

    #[tokio::test]
    async fn ensure_directory_creates_nested_path() {
        let dir = tempdir().expect("temp dir");
        let nested = dir.path().join("a").join("BIN");
        ensure_directory(&nested).await.expect("create");
        assert!(nested.is_dir());
    }
}
