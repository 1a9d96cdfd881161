use std::path::{Path, PathBuf};

use strum_macros::{AsRefStr, Display};
use thiserror::Error;
use uuid::Uuid;

pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File exceeds the {limit} byte upload limit")]
    TooLarge { limit: usize },
    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("Uploaded file is empty")]
    Empty,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum UploadKind {
    Avatars,
    Pets,
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Relative URL stored on the owning record.
    pub url: String,
    pub path: PathBuf,
    pub size: usize,
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Stores profile and pet photos on local disk.
#[derive(Clone)]
pub struct UploadService {
    root: PathBuf,
    max_bytes: usize,
}

impl UploadService {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn store(
        &self,
        kind: UploadKind,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredUpload, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                limit: self.max_bytes,
            });
        }
        let extension = extension_for(content_type)
            .ok_or_else(|| UploadError::UnsupportedType(content_type.to_string()))?;

        let dir = self.root.join(kind.as_ref());
        tokio::fs::create_dir_all(&dir).await?;
        let file_name = format!("{}.{extension}", Uuid::new_v4());
        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes).await?;

        tracing::info!(
            path = %path.display(),
            size = bytes.len(),
            "Stored uploaded file"
        );
        Ok(StoredUpload {
            url: format!("{PUBLIC_PREFIX}/{kind}/{file_name}"),
            path,
            size: bytes.len(),
        })
    }

    /// Removes a previously stored file by its public URL. Unknown URLs are
    /// ignored.
    pub async fn remove_by_url(&self, url: &str) {
        let Some(relative) = url.strip_prefix(PUBLIC_PREFIX) else {
            return;
        };
        let relative = relative.trim_start_matches('/');
        if relative.split('/').any(|part| part == ".." || part.is_empty()) {
            return;
        }
        let path = self.root.join(relative);
        if let Err(err) = tokio::fs::remove_file(&path).await
            && err.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %path.display(), "Failed to remove upload: {err}");
        }
    }
}
