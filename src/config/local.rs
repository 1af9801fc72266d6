use crate::domain::ports::Uploader;
use crate::utils::error::{Result, WorkerError};
use base64::{prelude::BASE64_STANDARD, Engine};
use std::path::{Component, Path, PathBuf};

/// Uploader used when no bucket is configured. Copies the image under
/// `simulated_uploaded/<job_id>/` and answers with an inline data URL.
#[derive(Debug, Clone)]
pub struct InlineUploader {
    base_path: PathBuf,
}

impl InlineUploader {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Directory for one job's uploads. The job id must be a single plain path
    /// component so uploads stay under `simulated_uploaded/`.
    pub fn upload_dir(&self, job_id: &str) -> Result<PathBuf> {
        let mut components = Path::new(job_id).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_normal || job_id.contains(&['/', '\\'][..]) {
            return Err(WorkerError::UploadError {
                message: format!("job id {:?} cannot be used as a directory name", job_id),
            });
        }
        Ok(self.base_path.join("simulated_uploaded").join(job_id))
    }
}

impl Uploader for InlineUploader {
    async fn upload_image(&self, job_id: &str, path: &Path) -> Result<String> {
        let target_dir = self.upload_dir(job_id)?;
        let file_name = path.file_name().ok_or_else(|| WorkerError::UploadError {
            message: format!("{} has no file name", path.display()),
        })?;
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("png")
            .to_ascii_lowercase();

        let data = tokio::fs::read(path).await?;

        tokio::fs::create_dir_all(&target_dir).await?;
        tokio::fs::write(target_dir.join(file_name), &data).await?;

        Ok(format!(
            "data:image/{};base64,{}",
            format,
            BASE64_STANDARD.encode(&data)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_inline_upload_copies_and_encodes() {
        let temp_dir = TempDir::new().unwrap();
        let image = temp_dir.path().join("render.png");
        std::fs::write(&image, b"\x89PNG fake").unwrap();

        let uploader = InlineUploader::new(temp_dir.path());
        let url = uploader.upload_image("job-7", &image).await.unwrap();

        assert_eq!(
            url,
            format!("data:image/png;base64,{}", BASE64_STANDARD.encode(b"\x89PNG fake"))
        );
        let copied = temp_dir
            .path()
            .join("simulated_uploaded")
            .join("job-7")
            .join("render.png");
        assert_eq!(std::fs::read(copied).unwrap(), b"\x89PNG fake");
    }

    #[tokio::test]
    async fn test_inline_upload_rejects_escaping_job_ids() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("base");
        let image = temp_dir.path().join("x.png");
        std::fs::write(&image, b"png").unwrap();

        let uploader = InlineUploader::new(&base);
        for job_id in ["../../escaped", "..", ".", "", "a/b", "a\\b", "/abs"] {
            let result = uploader.upload_image(job_id, &image).await;
            assert!(
                matches!(result, Err(WorkerError::UploadError { .. })),
                "{:?} was accepted",
                job_id
            );
        }
        assert!(!temp_dir.path().join("escaped").exists());
        assert!(!base.exists());
    }

    #[tokio::test]
    async fn test_inline_upload_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let uploader = InlineUploader::new(temp_dir.path());
        let result = uploader
            .upload_image("job-8", &temp_dir.path().join("missing.png"))
            .await;
        assert!(matches!(result, Err(WorkerError::IoError(_))));
    }
}
