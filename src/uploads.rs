use crate::errors::ServiceError;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Maximum number of image files accepted in a single upload request.
pub const MAX_FILES_PER_REQUEST: usize = 10;

/// Per-file size ceiling (20 MiB).
pub const MAX_FILE_BYTES: usize = 20 * 1024 * 1024;

/// Accepted extension -> served content type.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
];

/// One file received in a multipart upload, before it is persisted.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Storage for uploaded product images.
///
/// `remove` failures are returned so callers can decide whether to swallow
/// them; a missing file is never an error.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Validates and persists a batch of files, returning assigned filenames
    /// in input order. Rejects the whole batch if any file fails validation;
    /// nothing is retained in that case.
    async fn store(&self, files: Vec<UploadedImage>) -> Result<Vec<String>, ServiceError>;

    /// Returns the raw bytes and content type for a stored file.
    async fn read(&self, filename: &str) -> Result<(Vec<u8>, &'static str), ServiceError>;

    /// Deletes a stored file. A file that is already gone is not an error.
    async fn remove(&self, filename: &str) -> Result<(), ServiceError>;
}

/// Filesystem-backed image store. Files live flat in a single directory,
/// named `<unix-millis>-<random>.<ext>`.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    /// Creates the store, creating the backing directory if absent.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            ServiceError::InternalError(format!(
                "failed to create upload directory {}: {}",
                root.display(),
                e
            ))
        })?;
        info!("Image store ready at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates one file and returns its normalized extension.
    fn validate(file: &UploadedImage) -> Result<&'static str, ServiceError> {
        let ext = file
            .original_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        let Some(&(ext, _)) = ALLOWED_TYPES.iter().find(|(allowed, _)| *allowed == ext) else {
            return Err(ServiceError::ValidationError(format!(
                "unsupported image type for '{}': allowed extensions are jpeg, jpg, png, webp",
                file.original_name
            )));
        };

        match file.content_type.as_deref() {
            Some(declared) if is_allowed_media_type(declared) => {}
            Some(declared) => {
                return Err(ServiceError::ValidationError(format!(
                    "unsupported media type '{}' for '{}'",
                    declared, file.original_name
                )));
            }
            None => {
                return Err(ServiceError::ValidationError(format!(
                    "missing media type for '{}'",
                    file.original_name
                )));
            }
        }

        if file.bytes.len() > MAX_FILE_BYTES {
            return Err(ServiceError::ValidationError(format!(
                "'{}' exceeds the {} MiB size limit",
                file.original_name,
                MAX_FILE_BYTES / (1024 * 1024)
            )));
        }

        Ok(ext)
    }

    /// Assigns a practically collision-free name within the store.
    fn assign_name(ext: &str) -> String {
        let millis = Utc::now().timestamp_millis();
        let nonce: u32 = rand::thread_rng().gen();
        format!("{}-{}.{}", millis, nonce, ext)
    }
}

fn is_allowed_media_type(declared: &str) -> bool {
    matches!(
        declared,
        "image/jpeg" | "image/jpg" | "image/png" | "image/webp"
    )
}

/// Rejects names that could escape the store directory.
fn sanitize(filename: &str) -> Option<&str> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return None;
    }
    Some(filename)
}

fn content_type_for(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    ALLOWED_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == ext)
        .map(|(_, ct)| *ct)
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn store(&self, files: Vec<UploadedImage>) -> Result<Vec<String>, ServiceError> {
        if files.len() > MAX_FILES_PER_REQUEST {
            return Err(ServiceError::ValidationError(format!(
                "at most {} images are accepted per request",
                MAX_FILES_PER_REQUEST
            )));
        }

        // Validate the whole batch before touching disk so a rejected
        // request retains nothing.
        let mut extensions = Vec::with_capacity(files.len());
        for file in &files {
            extensions.push(Self::validate(file)?);
        }

        let mut stored: Vec<String> = Vec::with_capacity(files.len());
        for (file, ext) in files.iter().zip(extensions) {
            let name = Self::assign_name(ext);
            let path = self.root.join(&name);

            if let Err(e) = tokio::fs::write(&path, &file.bytes).await {
                warn!("Failed to write {}: {}; rolling back batch", path.display(), e);
                for written in &stored {
                    if let Err(e) = self.remove(written).await {
                        warn!("Rollback removal of {} failed: {}", written, e);
                    }
                }
                return Err(ServiceError::InternalError(format!(
                    "failed to persist uploaded file '{}': {}",
                    file.original_name, e
                )));
            }

            stored.push(name);
        }

        info!("Stored {} uploaded image(s)", stored.len());
        Ok(stored)
    }

    async fn read(&self, filename: &str) -> Result<(Vec<u8>, &'static str), ServiceError> {
        let safe = sanitize(filename)
            .ok_or_else(|| ServiceError::NotFound(format!("file {}", filename)))?;
        let content_type = content_type_for(safe)
            .ok_or_else(|| ServiceError::NotFound(format!("file {}", safe)))?;

        match tokio::fs::read(self.root.join(safe)).await {
            Ok(bytes) => Ok((bytes, content_type)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServiceError::NotFound(format!("file {}", safe)))
            }
            Err(e) => Err(ServiceError::InternalError(format!(
                "failed to read stored file {}: {}",
                safe, e
            ))),
        }
    }

    async fn remove(&self, filename: &str) -> Result<(), ServiceError> {
        let Some(safe) = sanitize(filename) else {
            return Ok(());
        };

        match tokio::fs::remove_file(self.root.join(safe)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ServiceError::InternalError(format!(
                "failed to remove stored file {}: {}",
                safe, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn png(name: &str) -> UploadedImage {
        UploadedImage {
            original_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: Bytes::from_static(b"\x89PNG fake bytes"),
        }
    }

    fn store() -> (TempDir, FsImageStore) {
        let dir = TempDir::new().unwrap();
        let store = FsImageStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn stores_files_and_preserves_order() {
        let (_dir, store) = store();
        let names = store
            .store(vec![png("front.png"), png("side.png")])
            .await
            .unwrap();

        assert_eq!(names.len(), 2);
        for name in &names {
            assert!(name.ends_with(".png"));
            let (bytes, content_type) = store.read(name).await.unwrap();
            assert_eq!(content_type, "image/png");
            assert_eq!(bytes, b"\x89PNG fake bytes");
        }
        assert_ne!(names[0], names[1]);
    }

    #[tokio::test]
    async fn rejects_disallowed_extension_and_retains_nothing() {
        let (dir, store) = store();
        let mut gif = png("animated.gif");
        gif.content_type = Some("image/gif".to_string());

        let err = store.store(vec![png("ok.png"), gif]).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn rejects_mismatched_media_type() {
        let (_dir, store) = store();
        let mut file = png("photo.png");
        file.content_type = Some("application/octet-stream".to_string());

        let err = store.store(vec![file]).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn rejects_more_than_ten_files() {
        let (_dir, store) = store();
        let files: Vec<_> = (0..11).map(|i| png(&format!("f{}.png", i))).collect();

        let err = store.store(files).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn rejects_oversized_file() {
        let (_dir, store) = store();
        let file = UploadedImage {
            original_name: "huge.png".to_string(),
            content_type: Some("image/png".to_string()),
            bytes: Bytes::from(vec![0u8; MAX_FILE_BYTES + 1]),
        };

        let err = store.store(vec![file]).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn read_refuses_path_traversal() {
        let (_dir, store) = store();
        for name in ["../etc/passwd.png", "a/b.png", "..", "nested\\x.png"] {
            let err = store.read(name).await.unwrap_err();
            assert!(matches!(err, ServiceError::NotFound(_)), "name: {}", name);
        }
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (_dir, store) = store();
        let names = store.store(vec![png("a.png"), png("b.png")]).await.unwrap();

        store.remove(&names[0]).await.unwrap();
        // Second removal of the same file is not an error.
        store.remove(&names[0]).await.unwrap();
        assert!(store.read(&names[0]).await.is_err());
        assert!(store.read(&names[1]).await.is_ok());
    }
}
