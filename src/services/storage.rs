use crate::{
    config::Config,
    error::{AppError, Result},
    utils::image::{decode_base64, ImageFormat, ImagePayload},
};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Public URL prefix under which stored files are served
pub const PUBLIC_PREFIX: &str = "/uploads";

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Stores the image under `directory` and returns its public path.
    async fn store(&self, image: &ImagePayload, directory: &str) -> Result<String>;

    /// Removes a previously stored file. Missing files are not an error.
    async fn delete(&self, path: &str) -> Result<()>;
}

/// 本地磁盘存储
#[derive(Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    http_client: Client,
    max_upload_size: usize,
}

impl LocalFileStorage {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(config.image_download_timeout_secs))
            .timeout(Duration::from_secs(config.image_download_timeout_secs))
            .build()?;

        Ok(Self {
            root: PathBuf::from(&config.upload_dir),
            http_client,
            max_upload_size: config.max_upload_size,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn download(&self, url: &url::Url) -> Result<(Vec<u8>, ImageFormat)> {
        debug!("Downloading image from {}", url);

        let mut response = self.http_client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "image download from {} failed with status {}",
                url,
                response.status()
            )));
        }

        let format = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ImageFormat::from_mime_type)
            .unwrap_or(ImageFormat::Jpeg);

        if response
            .content_length()
            .map_or(false, |length| length > self.max_upload_size as u64)
        {
            return Err(self.too_large());
        }

        // content-length is optional
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > self.max_upload_size {
                warn!("Aborted download from {} past {} bytes", url, self.max_upload_size);
                return Err(self.too_large());
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok((bytes, format))
    }

    fn too_large(&self) -> AppError {
        AppError::FileUpload(format!(
            "image exceeds the {} byte upload limit",
            self.max_upload_size
        ))
    }

    async fn write(&self, directory: &str, bytes: &[u8], format: ImageFormat) -> Result<String> {
        if bytes.is_empty() {
            return Err(AppError::FileUpload("image payload is empty".to_string()));
        }
        if bytes.len() > self.max_upload_size {
            return Err(self.too_large());
        }

        let relative_dir = safe_relative(directory)?;
        let filename = format!("{}.{}", Uuid::new_v4(), format.to_extension());
        let target_dir = self.root.join(&relative_dir);

        tokio::fs::create_dir_all(&target_dir).await?;
        tokio::fs::write(target_dir.join(&filename), bytes).await?;

        let public_path = format!("{}/{}/{}", PUBLIC_PREFIX, directory.trim_matches('/'), filename);
        info!("Stored {} bytes at {}", bytes.len(), public_path);
        Ok(public_path)
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, image: &ImagePayload, directory: &str) -> Result<String> {
        let (bytes, format) = match image {
            ImagePayload::DataUrl { mime_type, data } => (
                decode_base64(data).map_err(AppError::FileUpload)?,
                ImageFormat::from_mime_type(mime_type),
            ),
            ImagePayload::RawBase64(data) => {
                (decode_base64(data).map_err(AppError::FileUpload)?, ImageFormat::Jpeg)
            }
            ImagePayload::HttpUrl(url) => self.download(url).await?,
            ImagePayload::BlobRef(reference) => {
                return Err(AppError::FileUpload(format!(
                    "blob URL '{}' can only be resolved by the browser",
                    reference
                )))
            }
            ImagePayload::Invalid(reason) => {
                return Err(AppError::FileUpload(format!("unusable image payload: {}", reason)))
            }
        };

        self.write(directory, &bytes, format).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let relative = path
            .strip_prefix(PUBLIC_PREFIX)
            .unwrap_or(path)
            .trim_start_matches('/');
        let target = self.root.join(safe_relative(relative)?);

        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                info!("Deleted stored file {}", target.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Stored file {} was already gone", target.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Rejects absolute paths and parent-directory hops.
fn safe_relative(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path.trim_matches('/'));
    let escapes = candidate
        .components()
        .any(|component| !matches!(component, Component::Normal(_)));

    if escapes || candidate.as_os_str().is_empty() {
        return Err(AppError::BadRequest(format!("invalid storage path '{}'", path)));
    }
    Ok(candidate.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> LocalFileStorage {
        let dir = std::env::temp_dir().join(format!("pixelgram-storage-{}", Uuid::new_v4()));
        let config = Config {
            upload_dir: dir.to_string_lossy().to_string(),
            max_upload_size: 16,
            ..Config::default()
        };
        LocalFileStorage::new(&config).unwrap()
    }

    #[test]
    fn test_safe_relative() {
        assert!(safe_relative("posts/1").is_ok());
        assert!(safe_relative("/posts/1/").is_ok());
        assert!(safe_relative("../etc").is_err());
        assert!(safe_relative("posts/../../etc").is_err());
        assert!(safe_relative("").is_err());
    }

    #[tokio::test]
    async fn test_store_data_url_uses_mime_extension() {
        let storage = storage();
        let payload = ImagePayload::classify("data:image/png;base64,aGVsbG8=");

        let path = storage.store(&payload, "posts/1").await.unwrap();
        assert!(path.starts_with("/uploads/posts/1/"));
        assert!(path.ends_with(".png"));

        let on_disk = storage.root().join(path.trim_start_matches("/uploads/"));
        assert_eq!(tokio::fs::read(&on_disk).await.unwrap(), b"hello");

        storage.delete(&path).await.unwrap();
        assert!(!on_disk.exists());
        // second delete is a no-op
        storage.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_raw_base64_defaults_to_jpg() {
        let storage = storage();
        let path = storage
            .store(&ImagePayload::RawBase64("aGVsbG8=".to_string()), "profiles/3")
            .await
            .unwrap();
        assert!(path.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn test_rejects_unfetchable_and_oversized_payloads() {
        let storage = storage();

        let blob = ImagePayload::BlobRef("blob:http://localhost/1".to_string());
        assert!(matches!(storage.store(&blob, "posts/1").await, Err(AppError::FileUpload(_))));

        let invalid = ImagePayload::Invalid("garbage".to_string());
        assert!(matches!(storage.store(&invalid, "posts/1").await, Err(AppError::FileUpload(_))));

        // 24 decoded bytes, limit is 16
        let big = ImagePayload::RawBase64("YWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFh".to_string());
        assert!(matches!(storage.store(&big, "posts/1").await, Err(AppError::FileUpload(_))));
    }

    #[tokio::test]
    async fn test_delete_refuses_escaping_paths() {
        let storage = storage();
        assert!(storage.delete("/uploads/../secret.txt").await.is_err());
    }
}
