use std::{path::Path, sync::Arc};

use tokio::sync::RwLock;
use tracing::info;

use crate::{
    config::ServerConfig,
    publication::{Publication, PublicationState, StatusSnapshot, UpdateNotice},
    web::uploads::{StagedUpload, UploadResult},
};

#[derive(Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
    publication: Arc<RwLock<PublicationState>>,
}

impl AppState {
    /// Fresh state: nothing is published, whatever already sits in the upload directory.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            publication: Arc::new(RwLock::new(PublicationState::default())),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }

    /// Moves a staged image into place and publishes it as one step.
    ///
    /// The write guard is held across the rename, so the stored bytes and the published
    /// version always come from the same request. On failure the state is left untouched.
    pub async fn commit_and_publish(&self, upload: StagedUpload) -> UploadResult<()> {
        let version = upload.version.clone();
        let file_size = upload.file_size;

        let mut guard = self.publication.write().await;
        let stored_path = upload.commit(self.upload_dir()).await?;
        let file = stored_path.display().to_string();
        let previous = guard.publish(Publication::new(version.clone(), stored_path));
        drop(guard);

        info!(
            %version,
            %file,
            file_size,
            replaced = previous.as_ref().map(|p| p.version.as_str()),
            "BIOS update published"
        );
        Ok(())
    }

    pub async fn stop(&self) {
        let previous = {
            let mut guard = self.publication.write().await;
            guard.stop()
        };
        if let Some(previous) = previous {
            info!(version = %previous.version, "BIOS update withdrawn");
        }
    }

    pub async fn status(&self) -> StatusSnapshot {
        let guard = self.publication.read().await;
        guard.snapshot()
    }

    pub async fn update_notice(&self) -> Option<UpdateNotice> {
        let guard = self.publication.read().await;
        let base_url = self.config.public_base_url();
        guard
            .current()
            .map(|publication| UpdateNotice::for_publication(publication, &base_url))
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use tempfile::tempdir;

    use super::*;
    use crate::web::uploads::STORAGE_FAILED;

    fn state_for(upload_dir: &Path) -> AppState {
        AppState::new(ServerConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            public_host: "127.0.0.1".to_string(),
            upload_dir: upload_dir.to_path_buf(),
            max_upload_bytes: 1024,
        })
    }

    async fn staged(dir: &Path, version: &str, name: &str, bytes: &[u8]) -> StagedUpload {
        let staged_path = dir.join(format!(".{version}.part"));
        tokio::fs::write(&staged_path, bytes).await.unwrap();
        StagedUpload {
            version: version.to_string(),
            original_name: name.to_string(),
            staged_path,
            file_size: bytes.len() as u64,
        }
    }

    #[tokio::test]
    async fn commit_and_publish_updates_file_and_state_together() {
        let dir = tempdir().expect("temp dir");
        let state = state_for(dir.path());

        let upload = staged(dir.path(), "1.2.3", "bios.bin", b"image").await;
        state.commit_and_publish(upload).await.expect("publish");

        let status = state.status().await;
        assert_eq!(status.version.as_deref(), Some("1.2.3"));
        let stored = status.file_path.expect("file path");
        assert_eq!(tokio::fs::read(&stored).await.unwrap(), b"image");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_same_name_publishes_stay_consistent() {
        let dir = tempdir().expect("temp dir");
        let state = state_for(dir.path());

        for round in 0..50 {
            let a = staged(dir.path(), &format!("A{round}"), "bios.bin", b"AAAA").await;
            let b = staged(dir.path(), &format!("B{round}"), "bios.bin", b"BBBB").await;

            let first = tokio::spawn({
                let state = state.clone();
                async move { state.commit_and_publish(a).await }
            });
            let second = tokio::spawn({
                let state = state.clone();
                async move { state.commit_and_publish(b).await }
            });
            first.await.unwrap().expect("publish A");
            second.await.unwrap().expect("publish B");

            let version = state.status().await.version.expect("published");
            let bytes = tokio::fs::read(dir.path().join("bios.bin")).await.unwrap();
            let expected: &[u8] = if version.starts_with('A') { b"AAAA" } else { b"BBBB" };
            assert_eq!(bytes, expected, "round {round}: version {version}");
        }
    }

    #[tokio::test]
    async fn failed_commit_leaves_state_untouched() {
        let dir = tempdir().expect("temp dir");
        let state = state_for(dir.path());
        let first = staged(dir.path(), "1.0.0", "bios.bin", b"old").await;
        state.commit_and_publish(first).await.expect("publish");

        let missing = dir.path().join("removed");
        let broken = state_for(&missing);
        *broken.publication.write().await = state.publication.read().await.clone();
        let upload = staged(dir.path(), "2.0.0", "bios.bin", b"new").await;
        let staged_path = upload.staged_path.clone();

        let err = broken.commit_and_publish(upload).await.expect_err("missing directory");
        assert_eq!(err.message(), STORAGE_FAILED);
        assert!(!staged_path.exists());
        assert_eq!(broken.status().await.version.as_deref(), Some("1.0.0"));
    }
}
