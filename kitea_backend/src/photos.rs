use crate::config::{KiteaConfig, PhotoConfig};
use crate::database::models::PhotoRecord;
use crate::error::DomainError;
use anyhow::{Context, Result};
use blake3::Hasher;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Local photo storage: uploads land under `files/photos/<public_id>` and are
/// served back through the API.
#[derive(Clone)]
pub struct PhotoStore {
    dir: PathBuf,
    public_url: String,
    config: PhotoConfig,
}

#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub data: Bytes,
    pub mime: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PhotoFile {
    pub absolute_path: PathBuf,
    pub mime: String,
    pub size_bytes: u64,
}

impl PhotoStore {
    pub fn new(config: &KiteaConfig) -> Self {
        Self::with_dir(
            config.paths.photos_dir.clone(),
            config.public_url.clone(),
            config.photos.clone(),
        )
    }

    pub fn with_dir(dir: PathBuf, public_url: impl Into<String>, config: PhotoConfig) -> Self {
        Self {
            dir,
            public_url: public_url.into(),
            config,
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.config.max_upload_bytes
    }

    /// Checks the upload is a non-empty image within the size limit, then
    /// writes it under a fresh public id.
    pub async fn save(&self, upload: PhotoUpload) -> Result<PhotoRecord, DomainError> {
        if upload.data.is_empty() {
            return Err(DomainError::validation("Photo is required"));
        }
        let size_bytes = upload.data.len() as u64;
        if size_bytes > self.config.max_upload_bytes {
            return Err(DomainError::validation(format!(
                "Photo exceeds the {} byte limit",
                self.config.max_upload_bytes
            )));
        }
        let (mime, extension) = match infer::get(&upload.data) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
                (kind.mime_type().to_string(), kind.extension())
            }
            _ => {
                tracing::debug!(declared = ?upload.mime, "rejected non-image upload");
                return Err(DomainError::validation("Only image files are allowed"));
            }
        };

        let public_id = format!("{}.{extension}", Uuid::new_v4());
        let absolute_path = self.dir.join(&public_id);
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create photo directory {}", self.dir.display()))?;
        fs::write(&absolute_path, &upload.data)
            .await
            .with_context(|| format!("failed to write photo to {}", absolute_path.display()))?;

        let mut hasher = Hasher::new();
        hasher.update(&upload.data);
        let checksum = format!("blake3:{}", hasher.finalize().to_hex());

        tracing::info!(public_id = %public_id, original = ?upload.file_name, size_bytes, mime = %mime, "photo stored");
        Ok(PhotoRecord {
            url: format!("{}/api/photos/{public_id}", self.public_url),
            public_id,
            mime,
            size_bytes: i64::try_from(size_bytes).context("photo size out of range")?,
            checksum,
        })
    }

    /// Resolves a public id to a file on disk. Ids that try to leave the
    /// photo directory resolve to nothing.
    pub async fn open(&self, public_id: &str) -> Result<Option<PhotoFile>> {
        let Some(absolute_path) = self.path_for(public_id) else {
            return Ok(None);
        };
        let metadata = match fs::metadata(&absolute_path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Ok(None),
        };
        let head = read_head(&absolute_path).await?;
        let mime = infer::get(&head)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Ok(Some(PhotoFile {
            absolute_path,
            mime,
            size_bytes: metadata.len(),
        }))
    }

    /// Removes a stored photo. Returns whether a file was deleted.
    pub async fn destroy(&self, public_id: &str) -> Result<bool> {
        let Some(absolute_path) = self.path_for(public_id) else {
            return Ok(false);
        };
        match fs::remove_file(&absolute_path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err::<bool, _>(err)
                .with_context(|| format!("failed to delete photo {}", absolute_path.display())),
        }
    }

    fn path_for(&self, public_id: &str) -> Option<PathBuf> {
        let valid = !public_id.is_empty()
            && public_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            && !public_id.starts_with('.');
        valid.then(|| self.dir.join(public_id))
    }
}

async fn read_head(path: &Path) -> Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;
    let mut file = fs::File::open(path)
        .await
        .with_context(|| format!("failed to open photo {}", path.display()))?;
    let mut head = vec![0u8; 64];
    let read = file.read(&mut head).await?;
    head.truncate(read);
    Ok(head)
}

#[cfg(test)]
pub(crate) const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];
