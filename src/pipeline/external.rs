//! Contracts with the external image generator and blob storage, plus the
//! retry/timeout wrapper every external call goes through.

use std::future::Future;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ExternalError, PipelineError};

/// Produces a raster image from a text prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<DynamicImage, ExternalError>;
}

/// Stores a finished image and returns a URL it can be fetched from.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn upload(&self, image: &DynamicImage) -> Result<String, ExternalError>;
}

/// Deadline and retry budget for one kind of external call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Per-attempt deadline in milliseconds.
    pub timeout_ms: u64,
    /// Additional attempts after the first.
    /// Default: 1
    pub retries: u32,
    /// Pause before each retry in milliseconds.
    /// Default: 500
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retries: 1,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Run `op` under the policy's deadline, retrying retryable failures.
///
/// The service's own quota exhaustion is never retried. When the budget is
/// spent, the last failure is reported as `ExternalService`.
pub async fn call_with_retry<T, F, Fut>(service: &str, policy: &RetryPolicy, mut op: F) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExternalError>>,
{
    let max_attempts = policy.retries.saturating_add(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(policy.timeout(), op()).await {
            Ok(result) => result,
            Err(_) => Err(ExternalError::Timeout),
        };

        let err = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} succeeded on attempt {}", service, attempt);
                }
                return Ok(value);
            }
            Err(ExternalError::QuotaExceeded) => {
                warn!("{} reported quota exhaustion", service);
                return Err(PipelineError::UpstreamQuotaExceeded {
                    service: service.to_string(),
                });
            }
            Err(e) => e,
        };

        if attempt >= max_attempts || !err.is_retryable() {
            warn!("{} failed after {} attempt(s): {}", service, attempt, err);
            return Err(PipelineError::ExternalService {
                service: service.to_string(),
                attempts: attempt,
                message: err.to_string(),
            });
        }
        warn!("{} attempt {} failed ({}), retrying in {} ms", service, attempt, err, policy.backoff_ms);
        tokio::time::sleep(policy.backoff()).await;
    }
}

/// Reject images a generator should never return: zero-sized or completely
/// black.
pub fn validate_generated_image(img: &DynamicImage) -> Result<(), ExternalError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(ExternalError::Service("generated image is empty".to_string()));
    }
    if img.to_rgb8().pixels().all(|p| p.0 == [0, 0, 0]) {
        return Err(ExternalError::Service("generated image is completely black".to_string()));
    }
    Ok(())
}

/// Generator that always returns the same image.
#[derive(Debug, Clone)]
pub struct StaticImageGenerator {
    image: DynamicImage,
}

impl StaticImageGenerator {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).with_context(|| format!("Failed to open image {}", path.display()))?;
        Ok(Self::new(image))
    }
}

#[async_trait]
impl ImageGenerator for StaticImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<DynamicImage, ExternalError> {
        debug!("Static generator ignoring prompt of {} chars", prompt.len());
        Ok(self.image.clone())
    }
}

/// Storage that writes `<uuid>.png` into a local directory.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    dir: PathBuf,
}

impl FileSystemStorage {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `image` as PNG to `path`.
    pub async fn write_png(image: &DynamicImage, path: &Path) -> Result<(), ExternalError> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| ExternalError::Service(format!("PNG encoding failed: {e}")))?;
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| ExternalError::Service(format!("cannot write {}: {e}", path.display())))
    }
}

#[async_trait]
impl BlobStorage for FileSystemStorage {
    async fn upload(&self, image: &DynamicImage) -> Result<String, ExternalError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ExternalError::Service(format!("cannot create {}: {e}", self.dir.display())))?;
        let path = self.dir.join(format!("{}.png", uuid::Uuid::new_v4()));
        Self::write_png(image, &path).await?;
        let absolute = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        info!("Stored image at {}", absolute.display());
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            timeout_ms: 1_000,
            retries: 1,
            backoff_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = call_with_retry("svc", &fast_policy(), move || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ExternalError::Service("flaky".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), _> = call_with_retry("svc", &fast_policy(), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ExternalError::Service("down".into()))
            }
        })
        .await;
        match result {
            Err(PipelineError::ExternalService { attempts, message, .. }) => {
                assert_eq!(attempts, 2);
                assert_eq!(message, "down");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_quota_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), _> = call_with_retry("svc", &fast_policy(), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ExternalError::QuotaExceeded)
            }
        })
        .await;
        assert!(matches!(result, Err(PipelineError::UpstreamQuotaExceeded { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retried_then_reported() {
        let policy = RetryPolicy {
            timeout_ms: 100,
            retries: 1,
            backoff_ms: 50,
        };
        let result: Result<(), _> = call_with_retry("slow", &policy, || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        match result {
            Err(PipelineError::ExternalService { attempts, message, .. }) => {
                assert_eq!(attempts, 2);
                assert_eq!(message, "timed out");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validate_generated_image() {
        let black = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        assert!(validate_generated_image(&black).is_err());
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(validate_generated_image(&empty).is_err());
        let mut ok = RgbImage::new(4, 4);
        ok.put_pixel(1, 1, Rgb([10, 10, 10]));
        assert!(validate_generated_image(&DynamicImage::ImageRgb8(ok)).is_ok());
    }

    #[tokio::test]
    async fn test_file_system_storage_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(dir.path().join("out"));
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])));
        let url = storage.upload(&img).await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".png"));
        let path = url.trim_start_matches("file://");
        let back = image::open(path).unwrap().to_rgb8();
        assert_eq!(*back.get_pixel(3, 3), Rgb([1, 2, 3]));
    }
}
