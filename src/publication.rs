use std::path::{Path, PathBuf};

use serde::Serialize;

/// The artifact currently offered to polling clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub version: String,
    pub file_path: PathBuf,
}

impl Publication {
    pub fn new(version: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            version: version.into(),
            file_path: file_path.into(),
        }
    }

    /// Base name of the stored artifact, as exposed under `/BIN/`.
    pub fn file_name(&self) -> &str {
        self.file_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// Process-wide publication record. Either nothing is published or exactly one artifact is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationState {
    current: Option<Publication>,
}

impl PublicationState {
    pub fn current(&self) -> Option<&Publication> {
        self.current.as_ref()
    }

    /// Replaces whatever was published before and returns it.
    pub fn publish(&mut self, publication: Publication) -> Option<Publication> {
        self.current.replace(publication)
    }

    pub fn stop(&mut self) -> Option<Publication> {
        self.current.take()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        match &self.current {
            Some(publication) => StatusSnapshot {
                is_published: true,
                version: Some(publication.version.clone()),
                file_path: Some(path_to_string(&publication.file_path)),
            },
            None => StatusSnapshot::default(),
        }
    }
}

/// JSON body of `GET /status`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub is_published: bool,
    pub version: Option<String>,
    pub file_path: Option<String>,
}

/// JSON body of `GET /update`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UpdateNotice {
    pub message: String,
    pub image_url: String,
}

impl UpdateNotice {
    pub fn for_publication(publication: &Publication, base_url: &str) -> Self {
        Self {
            message: format!("New BIOS version available: {}", publication.version),
            image_url: format!(
                "{}/BIN/{}",
                base_url.trim_end_matches('/'),
                publication.file_name()
            ),
        }
    }
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
