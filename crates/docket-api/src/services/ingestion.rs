//! Upload ingestion: validate, hash, store-or-link, enqueue.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use docket_core::defaults;
use docket_core::{
    ensure_accepted, ContentStore, Error, Result, UploadCatalog, UploadListing, UserId, WorkQueue,
};

/// Upload validation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// The only MIME type accepted, matched against sniffed bytes.
    pub accepted_mime_type: String,
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            accepted_mime_type: defaults::ACCEPTED_MIME_TYPE.to_string(),
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
        }
    }
}

impl IngestConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `ACCEPTED_MIME_TYPE` | `application/pdf` |
    /// | `MAX_UPLOAD_BYTES` | `10485760` |
    pub fn from_env() -> Self {
        let base = Self::default();

        let accepted_mime_type = std::env::var("ACCEPTED_MIME_TYPE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(base.accepted_mime_type);

        let max_upload_bytes = std::env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(base.max_upload_bytes);

        Self {
            accepted_mime_type,
            max_upload_bytes,
        }
    }

    /// Set the accepted MIME type.
    pub fn with_accepted_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.accepted_mime_type = mime.into();
        self
    }

    /// Set the upload size limit.
    pub fn with_max_upload_bytes(mut self, n: usize) -> Self {
        self.max_upload_bytes = n;
        self
    }
}

/// What one ingest call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub upload_id: Uuid,
    pub stored_file_id: Uuid,
    pub content_hash: String,
    /// Whether these bytes were seen for the first time.
    pub is_new: bool,
    /// Job queued by this call; `None` when the file already had one.
    pub job_id: Option<Uuid>,
}

/// Composes the content store, catalog and queue for uploads.
pub struct IngestionService {
    files: Arc<dyn ContentStore>,
    uploads: Arc<dyn UploadCatalog>,
    jobs: Arc<dyn WorkQueue>,
    config: IngestConfig,
}

impl IngestionService {
    pub fn new(
        files: Arc<dyn ContentStore>,
        uploads: Arc<dyn UploadCatalog>,
        jobs: Arc<dyn WorkQueue>,
        config: IngestConfig,
    ) -> Self {
        Self {
            files,
            uploads,
            jobs,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest one upload for `user_id`.
    ///
    /// Validation runs before any write. Writes go store, then catalog, then
    /// queue. New bytes are always enqueued; repeat bytes are enqueued only
    /// when an earlier ingest stored them but failed before queueing.
    pub async fn ingest(
        &self,
        user_id: UserId,
        data: &[u8],
        display_name: &str,
    ) -> Result<IngestOutcome> {
        let start = Instant::now();

        if data.len() > self.config.max_upload_bytes {
            return Err(Error::InvalidInput(format!(
                "Uploaded file is {} bytes, limit is {}",
                data.len(),
                self.config.max_upload_bytes
            )));
        }
        let detected = ensure_accepted(data, &self.config.accepted_mime_type)?;
        debug!(
            subsystem = "ingest",
            user_id = user_id.0,
            mime_type = detected,
            size_bytes = data.len(),
            "Upload validated"
        );

        let resolution = self.files.resolve(data, display_name).await?;
        let upload_id = self
            .uploads
            .record_upload(user_id, resolution.stored_file_id, display_name)
            .await?;

        let job_id = if resolution.is_new {
            Some(self.jobs.enqueue(resolution.stored_file_id).await?)
        } else if self
            .jobs
            .get_for_file(resolution.stored_file_id)
            .await?
            .is_none()
        {
            warn!(
                subsystem = "ingest",
                stored_file_id = %resolution.stored_file_id,
                "Stored file had no parse job, enqueueing"
            );
            Some(self.jobs.enqueue(resolution.stored_file_id).await?)
        } else {
            None
        };

        info!(
            subsystem = "ingest",
            component = "ingestion_service",
            op = "ingest",
            user_id = user_id.0,
            upload_id = %upload_id,
            stored_file_id = %resolution.stored_file_id,
            content_hash = %resolution.content_hash,
            is_new = resolution.is_new,
            duration_ms = start.elapsed().as_millis() as u64,
            "Upload ingested"
        );

        Ok(IngestOutcome {
            upload_id,
            stored_file_id: resolution.stored_file_id,
            content_hash: resolution.content_hash,
            is_new: resolution.is_new,
            job_id,
        })
    }

    /// The user's uploads with the queue state of each file.
    pub async fn list_uploads(&self, user_id: UserId) -> Result<Vec<UploadListing>> {
        self.uploads.list_uploads(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::QueueStatus;
    use docket_db::MemoryStore;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

    fn service(store: &MemoryStore, config: IngestConfig) -> IngestionService {
        IngestionService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            config,
        )
    }

    #[test]
    fn test_ingest_config_default() {
        let config = IngestConfig::default();
        assert_eq!(config.accepted_mime_type, "application/pdf");
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_ingest_new_then_repeat() {
        let store = MemoryStore::new();
        let svc = service(&store, IngestConfig::default());

        let first = svc.ingest(UserId(1), PDF, "a.pdf").await.unwrap();
        assert!(first.is_new);
        assert!(first.job_id.is_some());

        let second = svc.ingest(UserId(2), PDF, "b.pdf").await.unwrap();
        assert!(!second.is_new);
        assert_eq!(second.job_id, None);
        assert_eq!(second.stored_file_id, first.stored_file_id);
        assert_ne!(second.upload_id, first.upload_id);

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.count_for_file(first.stored_file_id).await.unwrap(), 2);
        assert_eq!(store.stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_repeat_upload_enqueues_stored_file_without_job() {
        let store = MemoryStore::new();
        let svc = service(&store, IngestConfig::default());

        // An earlier ingest stored the bytes and then failed before queueing.
        let stranded = store.resolve(PDF, "a.pdf").await.unwrap();
        assert!(stranded.is_new);
        assert!(store.get_for_file(stranded.stored_file_id).await.unwrap().is_none());

        let outcome = svc.ingest(UserId(3), PDF, "a.pdf").await.unwrap();
        assert!(!outcome.is_new);
        assert_eq!(outcome.stored_file_id, stranded.stored_file_id);
        let job = store
            .get_for_file(stranded.stored_file_id)
            .await
            .unwrap()
            .expect("job enqueued for stranded file");
        assert_eq!(outcome.job_id, Some(job.id));
        assert_eq!(job.status, QueueStatus::Queued);

        // Once the job exists, further repeats leave the queue alone.
        let again = svc.ingest(UserId(4), PDF, "a.pdf").await.unwrap();
        assert_eq!(again.job_id, None);
        assert_eq!(store.stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_same_user_repeat_upload_creates_second_record() {
        let store = MemoryStore::new();
        let svc = service(&store, IngestConfig::default());

        svc.ingest(UserId(5), PDF, "a.pdf").await.unwrap();
        svc.ingest(UserId(5), PDF, "a-copy.pdf").await.unwrap();

        let listing = svc.list_uploads(UserId(5)).await.unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].original_name, "a.pdf");
        assert_eq!(listing[1].original_name, "a-copy.pdf");
        assert!(listing
            .iter()
            .all(|l| l.queue_status == Some(QueueStatus::Queued)));
    }

    #[tokio::test]
    async fn test_rejected_type_writes_nothing() {
        let store = MemoryStore::new();
        let svc = service(&store, IngestConfig::default());

        let err = svc
            .ingest(UserId(1), b"just some text", "notes.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(svc.list_uploads(UserId(1)).await.unwrap().is_empty());
        assert_eq!(store.stats().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let store = MemoryStore::new();
        let svc = service(&store, IngestConfig::default());
        assert!(matches!(
            svc.ingest(UserId(1), b"", "empty.pdf").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected_before_write() {
        let store = MemoryStore::new();
        let svc = service(&store, IngestConfig::default().with_max_upload_bytes(8));

        let err = svc.ingest(UserId(1), PDF, "big.pdf").await.unwrap_err();
        assert!(err.to_string().contains("limit is 8"));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_accepted_type_is_configurable() {
        let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";
        let store = MemoryStore::new();
        let svc = service(
            &store,
            IngestConfig::default().with_accepted_mime_type("image/png"),
        );

        assert!(svc.ingest(UserId(1), png, "x.png").await.unwrap().is_new);
        assert!(svc.ingest(UserId(1), PDF, "x.pdf").await.is_err());
    }
}
