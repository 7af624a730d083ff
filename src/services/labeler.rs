use std::sync::Arc;

use crate::db::{MetadataError, MetadataStore};
use crate::models::job::Job;
use crate::models::record::ImageRecord;
use crate::services::detection::{DetectionError, DetectionService};
use crate::services::storage::{ObjectStoreRead, ObjectStoreWrite, StorageError};
use crate::services::thumbnail::{self, ThumbnailError};

/// The labeling pipeline: fetch the original, detect labels, derive a
/// thumbnail, write it to the thumbnail bucket at the mirrored key, upsert
/// the image record.
///
/// Every step is safe to repeat: thumbnail and record writes overwrite, so a
/// redelivered job (duplicate delivery, crash between steps, visibility
/// timeout) converges to the same final state. The caller acknowledges the
/// queue delivery only after `process` returns Ok; on Err the delivery is
/// left unacknowledged and the queue redelivers or dead-letters it.
pub struct Labeler {
    images: Arc<dyn ObjectStoreRead>,
    thumbnails: Arc<dyn ObjectStoreWrite>,
    detector: Arc<dyn DetectionService>,
    metadata: Arc<dyn MetadataStore>,
}

impl Labeler {
    pub fn new(
        images: Arc<dyn ObjectStoreRead>,
        thumbnails: Arc<dyn ObjectStoreWrite>,
        detector: Arc<dyn DetectionService>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            images,
            thumbnails,
            detector,
            metadata,
        }
    }

    pub async fn process(&self, job: &Job) -> Result<ImageRecord, ProcessError> {
        let key = &job.source_key;

        tracing::debug!(source_key = %key, "Fetching original image");
        let original = self.images.get(key).await?;

        tracing::debug!(source_key = %key, bytes = original.len(), "Detecting labels");
        let labels = self.detector.detect_labels(&original).await?;

        tracing::debug!(source_key = %key, labels = labels.len(), "Deriving thumbnail");
        let thumb = thumbnail::derive(&original)?;

        tracing::debug!(source_key = %key, "Writing thumbnail");
        self.thumbnails.put(key, &thumb, "image/jpeg").await?;

        let record = ImageRecord {
            image_key: key.clone(),
            labels,
            thumbnail_key: key.clone(),
        };

        tracing::debug!(source_key = %key, "Upserting image record");
        self.metadata.upsert(&record).await?;

        Ok(record)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Object store: {0}")]
    Storage(#[from] StorageError),

    #[error("Detection: {0}")]
    Detection(#[from] DetectionError),

    #[error("Thumbnail: {0}")]
    Thumbnail(#[from] ThumbnailError),

    #[error("Metadata store: {0}")]
    Metadata(#[from] MetadataError),
}
