use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// URL prefix of stored images; also the subdirectory under `UPLOAD_DIR`.
pub const UPLOAD_PREFIX: &str = "/uploads";

const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

pub fn uploads_dir(upload_root: &Path) -> PathBuf {
    upload_root.join(UPLOAD_PREFIX.trim_start_matches('/'))
}

/// Map a stored `/uploads/<file>` path to the file on disk. Only the file
/// name is kept so stored paths cannot escape the upload directory.
pub fn resolve(upload_root: &Path, web_path: &str) -> Option<PathBuf> {
    let file_name = Path::new(web_path).file_name()?;
    Some(uploads_dir(upload_root).join(file_name))
}

pub fn web_path(file_name: &str) -> String {
    format!("{UPLOAD_PREFIX}/{file_name}")
}

pub fn image_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Store an uploaded image under a fresh name and return its web path.
pub async fn save_image(upload_root: &Path, original_name: &str, bytes: &[u8]) -> AppResult<String> {
    let ext = image_extension(original_name).ok_or_else(|| {
        AppError::bad_request(format!("Unsupported image type: {original_name}"))
    })?;
    if bytes.is_empty() {
        return Err(AppError::bad_request(format!("Empty file: {original_name}")));
    }

    let dir = uploads_dir(upload_root);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("create upload dir: {e}")))?;

    let file_name = format!("{}.{ext}", Uuid::new_v4());
    tokio::fs::write(dir.join(&file_name), bytes)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("write upload: {e}")))?;

    tracing::debug!(file = %file_name, size = bytes.len(), "image stored");
    Ok(web_path(&file_name))
}

/// Remove stored images, e.g. after the record that referenced them was not
/// saved. Missing files are ignored.
pub async fn discard(upload_root: &Path, web_paths: &[String]) {
    for web_path in web_paths {
        let Some(file) = resolve(upload_root, web_path) else {
            continue;
        };
        if let Err(err) = tokio::fs::remove_file(&file).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(file = %file.display(), error = %err, "failed to remove upload");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_keeps_only_the_file_name() {
        let root = Path::new("/srv/wwwroot");
        assert_eq!(
            resolve(root, "/uploads/a.jpg").unwrap(),
            PathBuf::from("/srv/wwwroot/uploads/a.jpg")
        );
        assert_eq!(
            resolve(root, "/uploads/../../etc/passwd").unwrap(),
            PathBuf::from("/srv/wwwroot/uploads/passwd")
        );
    }

    #[test]
    fn only_image_extensions_are_accepted() {
        assert_eq!(image_extension("Photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(image_extension("x.webp").as_deref(), Some("webp"));
        assert!(image_extension("script.sh").is_none());
        assert!(image_extension("noext").is_none());
    }

    #[tokio::test]
    async fn save_image_writes_under_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_image(dir.path(), "dress.png", b"png-bytes").await.unwrap();

        assert!(path.starts_with("/uploads/"));
        assert!(path.ends_with(".png"));
        let on_disk = resolve(dir.path(), &path).unwrap();
        assert_eq!(std::fs::read(on_disk).unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn save_image_rejects_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_image(dir.path(), "notes.txt", b"hi").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn discard_removes_stored_images() {
        let dir = tempfile::tempdir().unwrap();
        let kept = save_image(dir.path(), "keep.jpg", b"a").await.unwrap();
        let dropped = save_image(dir.path(), "drop.jpg", b"b").await.unwrap();

        discard(dir.path(), &[dropped.clone(), "/uploads/never-stored.jpg".to_string()]).await;

        assert!(!resolve(dir.path(), &dropped).unwrap().exists());
        assert!(resolve(dir.path(), &kept).unwrap().exists());
    }
}
